//! `hbnb-core` — entity model for the rental domain.
//!
//! This crate contains **pure domain** types (no IO, no HTTP, no storage):
//! identifiers, timestamps, the shared base entity, the six domain records and
//! the closed [`AnyEntity`] union the storage engine works with.

pub mod entity;
pub mod error;
pub mod id;
pub mod model;
pub mod timestamp;

pub use entity::{
    AnyEntity, Attributes, CLASS_FIELD, EntityKind, Model, PROTECTED_FIELDS, composite_key, split_key,
};
pub use error::{DomainError, DomainResult};
pub use id::EntityId;
pub use model::{Amenity, BaseEntity, City, Place, Review, State, User};
