//! Domain records.

mod amenity;
mod base;
mod city;
mod place;
mod review;
mod state;
mod user;

pub use amenity::Amenity;
pub use base::BaseEntity;
pub use city::City;
pub use place::Place;
pub use review::Review;
pub use state::State;
pub use user::User;

/// Implements [`Model`](crate::entity::Model) and the `AnyEntity` conversion
/// for a record with a flattened `base` field.
macro_rules! impl_model {
    ($t:ident $(, immutable = [$($imm:literal),*])? $(, hidden = [$($hid:literal),*])?) => {
        impl $crate::entity::Model for $t {
            const KIND: $crate::entity::EntityKind = $crate::entity::EntityKind::$t;
            $(const IMMUTABLE_FIELDS: &'static [&'static str] = &[$($imm),*];)?
            $(const HIDDEN_FIELDS: &'static [&'static str] = &[$($hid),*];)?

            fn base(&self) -> &$crate::model::BaseEntity {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::model::BaseEntity {
                &mut self.base
            }

            fn from_any(entity: $crate::entity::AnyEntity) -> Option<Self> {
                match entity {
                    $crate::entity::AnyEntity::$t(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_any_ref(entity: &$crate::entity::AnyEntity) -> Option<&Self> {
                match entity {
                    $crate::entity::AnyEntity::$t(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$t> for $crate::entity::AnyEntity {
            fn from(value: $t) -> Self {
                $crate::entity::AnyEntity::$t(value)
            }
        }
    };
}

pub(crate) use impl_model;
