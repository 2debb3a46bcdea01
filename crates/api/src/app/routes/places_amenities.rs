use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use hbnb_core::{Amenity, Model, Place};
use hbnb_infra::StorageExt;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn list_place_amenities(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(place_id): Path<String>,
) -> ApiResult {
    let place = common::fetch::<Place>(&ctx, &place_id)?;
    let amenities = ctx
        .storage()
        .all_of::<Amenity>()
        .into_iter()
        .filter(|amenity| place.has_amenity(amenity.id()));
    Ok(Json(dto::list_to_json(amenities)).into_response())
}

/// 201 when newly linked, 200 when the link already existed.
pub async fn link_amenity(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path((place_id, amenity_id)): Path<(String, String)>,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let mut place = common::fetch::<Place>(&ctx, &place_id)?;
    let amenity = common::fetch::<Amenity>(&ctx, &amenity_id)?;

    if !place.link_amenity(amenity.id().clone()) {
        return Ok(Json(amenity.to_representation()).into_response());
    }

    let storage = ctx.storage();
    storage.put(place);
    storage.save().await?;

    info!(%place_id, %amenity_id, "amenity linked");
    Ok((StatusCode::CREATED, Json(amenity.to_representation())).into_response())
}

/// Unlinking an amenity that is not linked is a no-op.
pub async fn unlink_amenity(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path((place_id, amenity_id)): Path<(String, String)>,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let mut place = common::fetch::<Place>(&ctx, &place_id)?;
    let amenity = common::fetch::<Amenity>(&ctx, &amenity_id)?;

    if place.unlink_amenity(amenity.id()) {
        let storage = ctx.storage();
        storage.put(place);
        storage.save().await?;
        info!(%place_id, %amenity_id, "amenity unlinked");
    }

    Ok(Json(json!({})).into_response())
}
