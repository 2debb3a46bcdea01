//! Entity abstraction: identity, type tag, and attribute-map conversion.
//!
//! Every domain record implements [`Model`]; the storage engine only ever
//! handles the closed [`AnyEntity`] union and asks it for `kind()` and `id()`.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::id::EntityId;
use crate::model::{Amenity, BaseEntity, City, Place, Review, State, User};
use crate::timestamp;

/// Field-name to value mapping used for construction, updates and persistence.
pub type Attributes = serde_json::Map<String, Value>;

/// Keys no external update may touch.
pub const PROTECTED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Type tag carried in every attribute map.
pub const CLASS_FIELD: &str = "__class__";

/// The six stored entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Amenity,
    City,
    Place,
    Review,
    State,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Amenity,
        EntityKind::City,
        EntityKind::Place,
        EntityKind::Review,
        EntityKind::State,
        EntityKind::User,
    ];

    /// Type name used in composite keys and `__class__`.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Amenity => "Amenity",
            EntityKind::City => "City",
            EntityKind::Place => "Place",
            EntityKind::Review => "Review",
            EntityKind::State => "State",
            EntityKind::User => "User",
        }
    }

    /// Plural, lowercase name (stats keys, table names).
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Amenity => "amenities",
            EntityKind::City => "cities",
            EntityKind::Place => "places",
            EntityKind::Review => "reviews",
            EntityKind::State => "states",
            EntityKind::User => "users",
        }
    }

    /// Resolve a type name. Unknown names yield `None` rather than an error so
    /// callers can look up optimistically.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// `"<TypeName>.<id>"`.
pub fn composite_key(kind: EntityKind, id: &EntityId) -> String {
    format!("{}.{}", kind.name(), id)
}

/// Inverse of [`composite_key`].
pub fn split_key(key: &str) -> Option<(EntityKind, &str)> {
    let (name, id) = key.split_once('.')?;
    if id.is_empty() {
        return None;
    }
    Some((EntityKind::from_name(name)?, id))
}

/// A domain record the storage engine can hold.
pub trait Model:
    Serialize + DeserializeOwned + Clone + PartialEq + Into<AnyEntity> + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Keys an update silently skips, in addition to [`PROTECTED_FIELDS`].
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[];

    /// Keys left out of the public representation.
    const HIDDEN_FIELDS: &'static [&'static str] = &[];

    fn base(&self) -> &BaseEntity;
    fn base_mut(&mut self) -> &mut BaseEntity;
    fn from_any(entity: AnyEntity) -> Option<Self>;
    fn from_any_ref(entity: &AnyEntity) -> Option<&Self>;

    fn id(&self) -> &EntityId {
        &self.base().id
    }

    fn key(&self) -> String {
        composite_key(Self::KIND, self.id())
    }

    /// Build an entity from caller-supplied attributes merged over generated
    /// defaults: a fresh id if none is given, and one shared "now" for any
    /// missing timestamp. Unknown keys are ignored.
    fn from_attributes(mut attrs: Attributes) -> DomainResult<Self> {
        attrs.remove(CLASS_FIELD);
        if !attrs.contains_key("id") {
            attrs.insert("id".into(), Value::String(EntityId::new().into()));
        }
        let now = timestamp::format(&timestamp::now());
        if !attrs.contains_key("created_at") {
            attrs.insert("created_at".into(), Value::String(now.clone()));
        }
        if !attrs.contains_key("updated_at") {
            attrs.insert("updated_at".into(), Value::String(now));
        }

        serde_json::from_value(Value::Object(attrs))
            .map_err(|e| DomainError::validation(format!("{}: {e}", Self::KIND)))
    }

    /// Full attribute set, including `__class__`.
    fn to_attributes(&self) -> Attributes {
        let mut attrs = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Attributes::new(),
        };
        attrs.insert(CLASS_FIELD.into(), Value::String(Self::KIND.name().into()));
        attrs
    }

    /// Apply an external update. Identity, timestamps and
    /// [`IMMUTABLE_FIELDS`](Model::IMMUTABLE_FIELDS) are skipped; `updated_at`
    /// is re-stamped. On error `self` is left untouched.
    fn apply_update(&mut self, changes: &Attributes) -> DomainResult<()> {
        let mut attrs = self.to_attributes();
        for (key, value) in changes {
            let key = key.as_str();
            if PROTECTED_FIELDS.contains(&key)
                || Self::IMMUTABLE_FIELDS.contains(&key)
                || key == CLASS_FIELD
            {
                continue;
            }
            attrs.insert(key.to_string(), value.clone());
        }

        let mut updated = Self::from_attributes(attrs)?;
        updated.base_mut().touch();
        *self = updated;
        Ok(())
    }

    /// JSON representation returned to API clients.
    fn to_representation(&self) -> Value {
        let mut attrs = self.to_attributes();
        for field in Self::HIDDEN_FIELDS {
            attrs.remove(*field);
        }
        Value::Object(attrs)
    }
}

/// Closed union over every stored entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyEntity {
    Amenity(Amenity),
    City(City),
    Place(Place),
    Review(Review),
    State(State),
    User(User),
}

macro_rules! dispatch {
    ($self:expr, $e:ident => $body:expr) => {
        match $self {
            AnyEntity::Amenity($e) => $body,
            AnyEntity::City($e) => $body,
            AnyEntity::Place($e) => $body,
            AnyEntity::Review($e) => $body,
            AnyEntity::State($e) => $body,
            AnyEntity::User($e) => $body,
        }
    };
}

impl AnyEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            AnyEntity::Amenity(_) => EntityKind::Amenity,
            AnyEntity::City(_) => EntityKind::City,
            AnyEntity::Place(_) => EntityKind::Place,
            AnyEntity::Review(_) => EntityKind::Review,
            AnyEntity::State(_) => EntityKind::State,
            AnyEntity::User(_) => EntityKind::User,
        }
    }

    pub fn base(&self) -> &BaseEntity {
        dispatch!(self, e => e.base())
    }

    pub fn id(&self) -> &EntityId {
        &self.base().id
    }

    pub fn key(&self) -> String {
        composite_key(self.kind(), self.id())
    }

    pub fn to_attributes(&self) -> Attributes {
        dispatch!(self, e => e.to_attributes())
    }

    pub fn to_representation(&self) -> Value {
        dispatch!(self, e => e.to_representation())
    }

    /// Rehydrate an entity of a known kind.
    pub fn from_attributes(kind: EntityKind, attrs: Attributes) -> DomainResult<Self> {
        Ok(match kind {
            EntityKind::Amenity => Amenity::from_attributes(attrs)?.into(),
            EntityKind::City => City::from_attributes(attrs)?.into(),
            EntityKind::Place => Place::from_attributes(attrs)?.into(),
            EntityKind::Review => Review::from_attributes(attrs)?.into(),
            EntityKind::State => State::from_attributes(attrs)?.into(),
            EntityKind::User => User::from_attributes(attrs)?.into(),
        })
    }

    pub fn as_model<T: Model>(&self) -> Option<&T> {
        T::from_any_ref(self)
    }

    pub fn into_model<T: Model>(self) -> Option<T> {
        T::from_any(self)
    }
}
