use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BaseEntity, impl_model};
use crate::id::EntityId;

/// A rentable place, owned by a User and located in a City.
///
/// `amenity_ids` is the many-to-many link to Amenity; it only changes through
/// [`Place::link_amenity`] / [`Place::unlink_amenity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    pub base: BaseEntity,
    #[serde(default = "EntityId::empty")]
    pub city_id: EntityId,
    #[serde(default = "EntityId::empty")]
    pub user_id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub number_rooms: i64,
    #[serde(default)]
    pub number_bathrooms: i64,
    #[serde(default)]
    pub max_guest: i64,
    #[serde(default)]
    pub price_by_night: i64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub amenity_ids: BTreeSet<EntityId>,
}

impl Place {
    pub fn new(name: impl Into<String>, city_id: EntityId, user_id: EntityId) -> Self {
        Self {
            base: BaseEntity::new(),
            city_id,
            user_id,
            name: name.into(),
            description: String::new(),
            number_rooms: 0,
            number_bathrooms: 0,
            max_guest: 0,
            price_by_night: 0,
            latitude: 0.0,
            longitude: 0.0,
            amenity_ids: BTreeSet::new(),
        }
    }

    pub fn has_amenity(&self, amenity_id: &EntityId) -> bool {
        self.amenity_ids.contains(amenity_id)
    }

    /// Returns `false` when the amenity was already linked.
    pub fn link_amenity(&mut self, amenity_id: EntityId) -> bool {
        self.amenity_ids.insert(amenity_id)
    }

    /// Returns `false` when the amenity was not linked.
    pub fn unlink_amenity(&mut self, amenity_id: &EntityId) -> bool {
        self.amenity_ids.remove(amenity_id)
    }
}

impl_model!(Place, immutable = ["user_id", "city_id", "amenity_ids"]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Model;
    use serde_json::json;

    #[test]
    fn numeric_fields_accept_json_numbers() {
        let raw = json!({
            "name": "Loft",
            "number_rooms": 3,
            "price_by_night": 120,
            "latitude": 37,
            "longitude": -122.431297,
        });
        let place = Place::from_attributes(raw.as_object().unwrap().clone()).unwrap();
        assert_eq!(place.number_rooms, 3);
        assert_eq!(place.latitude, 37.0);
        assert_eq!(place.longitude, -122.431297);
        assert!(place.amenity_ids.is_empty());
    }

    #[test]
    fn linking_is_idempotent() {
        let mut place = Place::new("Loft", EntityId::from("C1"), EntityId::from("U1"));
        assert!(place.link_amenity(EntityId::from("A1")));
        assert!(!place.link_amenity(EntityId::from("A1")));
        assert_eq!(place.amenity_ids.len(), 1);
        assert!(place.unlink_amenity(&EntityId::from("A1")));
        assert!(!place.unlink_amenity(&EntityId::from("A1")));
    }

    #[test]
    fn update_cannot_move_place_or_relink_amenities() {
        let mut place = Place::new("Loft", EntityId::from("C1"), EntityId::from("U1"));
        let changes = json!({
            "city_id": "C2",
            "user_id": "U2",
            "amenity_ids": ["A9"],
            "max_guest": 4,
        });
        place.apply_update(changes.as_object().unwrap()).unwrap();
        assert_eq!(place.city_id, "C1");
        assert_eq!(place.user_id, "U1");
        assert!(place.amenity_ids.is_empty());
        assert_eq!(place.max_guest, 4);
    }
}
