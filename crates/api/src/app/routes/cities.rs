use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use hbnb_core::{City, Model, State};
use hbnb_infra::StorageExt;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn list_cities(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(state_id): Path<String>,
) -> ApiResult {
    let state = common::fetch::<State>(&ctx, &state_id)?;
    let cities = ctx
        .storage()
        .all_of::<City>()
        .into_iter()
        .filter(|city| &city.state_id == state.id());
    Ok(Json(dto::list_to_json(cities)).into_response())
}

pub async fn create_city(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(state_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let state = common::fetch::<State>(&ctx, &state_id)?;
    let attrs = dto::json_object(&body)?;
    dto::require(&attrs, "name")?;

    let mut city: City = dto::build(attrs)?;
    city.state_id = state.id().clone();
    common::insert(&ctx, city).await
}

/// Like the generic update, but a new `state_id` must name a live State.
pub async fn update_city(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let mut city = common::fetch::<City>(&ctx, &id)?;
    let changes = dto::json_object(&body)?;
    if changes.contains_key("state_id") {
        let state_id = dto::require_id(&changes, "state_id")?;
        common::fetch::<State>(&ctx, state_id.as_str())?;
    }
    city.apply_update(&changes)?;

    let storage = ctx.storage();
    storage.put(city.clone());
    storage.save().await?;

    Ok(Json(city.to_representation()).into_response())
}
