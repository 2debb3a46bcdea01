//! Handlers and helpers shared by every resource.
//!
//! The generic handlers are mounted once per entity type (`show::<State>`,
//! `update::<Place>`, ...); resource files only add what differs: creation
//! and parent-scoped listings.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use hbnb_core::Model;
use hbnb_infra::StorageExt;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::context::AppContext;

/// Point lookup; absent entities become 404.
pub fn fetch<T: Model>(ctx: &AppContext, id: &str) -> ApiResult<T> {
    ctx.storage()
        .get_as::<T>(id)
        .ok_or_else(|| ApiError::not_found(T::KIND))
}

/// Register a new entity, persist, and answer 201 with its representation.
///
/// Callers hold the write guard.
pub async fn insert<T: Model>(ctx: &AppContext, entity: T) -> ApiResult {
    let storage = ctx.storage();
    storage.put(entity.clone());
    storage.save().await?;

    info!(kind = %T::KIND, id = %entity.id(), "created");
    Ok((StatusCode::CREATED, Json(entity.to_representation())).into_response())
}

pub async fn list<T: Model>(Extension(ctx): Extension<Arc<AppContext>>) -> Response {
    Json(dto::list_to_json(ctx.storage().all_of::<T>())).into_response()
}

pub async fn show<T: Model>(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult {
    let entity = fetch::<T>(&ctx, &id)?;
    Ok(Json(entity.to_representation()).into_response())
}

pub async fn update<T: Model>(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let mut entity = fetch::<T>(&ctx, &id)?;
    let changes = dto::json_object(&body)?;
    entity.apply_update(&changes)?;

    let storage = ctx.storage();
    storage.put(entity.clone());
    storage.save().await?;

    Ok(Json(entity.to_representation()).into_response())
}

pub async fn remove<T: Model>(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let entity = fetch::<T>(&ctx, &id)?;
    let storage = ctx.storage();
    storage.delete(&entity.into());
    storage.save().await?;

    info!(kind = %T::KIND, %id, "deleted");
    Ok(Json(json!({})).into_response())
}
