use serde::{Deserialize, Serialize};

use super::{BaseEntity, impl_model};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(flatten)]
    pub base: BaseEntity,
    #[serde(default)]
    pub name: String,
}

impl Amenity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BaseEntity::new(),
            name: name.into(),
        }
    }
}

impl_model!(Amenity);
