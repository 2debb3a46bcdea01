use serde::{Deserialize, Serialize};

use super::{BaseEntity, impl_model};
use crate::id::EntityId;

/// A city; `state_id` references its owning State and may be moved to
/// another one by an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    pub base: BaseEntity,
    #[serde(default)]
    pub name: String,
    #[serde(default = "EntityId::empty")]
    pub state_id: EntityId,
}

impl City {
    pub fn new(name: impl Into<String>, state_id: EntityId) -> Self {
        Self {
            base: BaseEntity::new(),
            name: name.into(),
            state_id,
        }
    }
}

impl_model!(City);
