use serde::Deserialize;
use serde_json::Value;

use hbnb_core::{Attributes, CLASS_FIELD, EntityId, Model, PROTECTED_FIELDS};

use crate::app::errors::{ApiError, ApiResult};

// -------------------------
// Request parsing
// -------------------------

/// Parse a request body that must be a JSON object.
pub fn json_object(body: &[u8]) -> ApiResult<Attributes> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::not_a_json()),
    }
}

pub fn require(attrs: &Attributes, field: &str) -> ApiResult<()> {
    if attrs.contains_key(field) {
        Ok(())
    } else {
        Err(ApiError::missing(field))
    }
}

/// A required field that holds an entity id.
pub fn require_id(attrs: &Attributes, field: &str) -> ApiResult<EntityId> {
    match attrs.get(field) {
        None => Err(ApiError::missing(field)),
        Some(Value::String(id)) => Ok(EntityId::from(id.as_str())),
        Some(_) => Err(ApiError::InvalidInput(format!("{field} must be a string"))),
    }
}

/// Build a fresh entity from a create body. Client-supplied identity and
/// timestamps are discarded.
pub fn build<T: Model>(mut attrs: Attributes) -> ApiResult<T> {
    for field in PROTECTED_FIELDS {
        attrs.remove(field);
    }
    attrs.remove(CLASS_FIELD);
    Ok(T::from_attributes(attrs)?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlacesSearchRequest {
    pub states: Vec<EntityId>,
    pub cities: Vec<EntityId>,
    pub amenities: Vec<EntityId>,
}

impl PlacesSearchRequest {
    /// The body must be a JSON object; `{}` means "no filter".
    pub fn parse(body: &[u8]) -> ApiResult<Self> {
        let attrs = json_object(body)?;
        serde_json::from_value(Value::Object(attrs))
            .map_err(|e| ApiError::InvalidInput(format!("invalid search filter: {e}")))
    }

    pub fn is_unfiltered(&self) -> bool {
        self.states.is_empty() && self.cities.is_empty() && self.amenities.is_empty()
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn list_to_json<T: Model>(items: impl IntoIterator<Item = T>) -> Value {
    Value::Array(items.into_iter().map(|m| m.to_representation()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbnb_core::State;
    use serde_json::json;

    #[test]
    fn non_object_bodies_are_not_json() {
        let bodies: [&[u8]; 4] = [b"[1,2]", b"\"name\"", b"{broken", b""];
        for body in bodies {
            assert!(matches!(
                json_object(body),
                Err(ApiError::InvalidInput(ref m)) if m == "Not a JSON"
            ));
        }
        assert!(json_object(b"{}").unwrap().is_empty());
    }

    #[test]
    fn build_discards_client_identity() {
        let attrs = json!({
            "id": "chosen",
            "created_at": "2017-03-25T02:17:06.000000",
            "__class__": "User",
            "name": "Nebraska"
        });
        let Value::Object(attrs) = attrs else { unreachable!() };

        let state: State = build(attrs).unwrap();
        assert_ne!(state.id().as_str(), "chosen");
        assert_eq!(state.name, "Nebraska");
    }

    #[test]
    fn require_id_rejects_non_strings() {
        let Value::Object(attrs) = json!({ "user_id": 7 }) else { unreachable!() };
        assert!(matches!(require_id(&attrs, "user_id"), Err(ApiError::InvalidInput(_))));
        assert!(matches!(
            require_id(&Attributes::new(), "user_id"),
            Err(ApiError::InvalidInput(ref m)) if m == "Missing user_id"
        ));
    }

    #[test]
    fn search_filter_accepts_empty_object_and_partial_keys() {
        assert!(matches!(
            PlacesSearchRequest::parse(b""),
            Err(ApiError::InvalidInput(ref m)) if m == "Not a JSON"
        ));
        assert!(PlacesSearchRequest::parse(b"  {} ").unwrap().is_unfiltered());

        let req = PlacesSearchRequest::parse(br#"{"cities": ["c1"]}"#).unwrap();
        assert_eq!(req.cities, vec![EntityId::from("c1")]);
        assert!(req.states.is_empty());

        assert!(PlacesSearchRequest::parse(b"[]").is_err());
        assert!(PlacesSearchRequest::parse(br#"{"states": "s1"}"#).is_err());
    }
}
