use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde_json::{json, Map, Value};

use hbnb_core::EntityKind;

use crate::context::AppContext;

pub async fn status() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// Live entity count per type, keyed by plural name.
pub async fn stats(Extension(ctx): Extension<Arc<AppContext>>) -> Json<Value> {
    let storage = ctx.storage();
    let counts: Map<String, Value> = EntityKind::ALL
        .into_iter()
        .map(|kind| (kind.plural().to_string(), json!(storage.count(Some(kind)))))
        .collect();
    Json(Value::Object(counts))
}
