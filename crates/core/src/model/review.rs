use serde::{Deserialize, Serialize};

use super::{BaseEntity, impl_model};
use crate::id::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(flatten)]
    pub base: BaseEntity,
    #[serde(default = "EntityId::empty")]
    pub place_id: EntityId,
    #[serde(default = "EntityId::empty")]
    pub user_id: EntityId,
    #[serde(default)]
    pub text: String,
}

impl Review {
    pub fn new(place_id: EntityId, user_id: EntityId, text: impl Into<String>) -> Self {
        Self {
            base: BaseEntity::new(),
            place_id,
            user_id,
            text: text.into(),
        }
    }
}

impl_model!(Review, immutable = ["user_id", "place_id"]);
