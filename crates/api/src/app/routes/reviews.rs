use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use hbnb_core::{Model, Place, Review, User};
use hbnb_infra::StorageExt;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn list_reviews(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(place_id): Path<String>,
) -> ApiResult {
    let place = common::fetch::<Place>(&ctx, &place_id)?;
    let reviews = ctx
        .storage()
        .all_of::<Review>()
        .into_iter()
        .filter(|review| &review.place_id == place.id());
    Ok(Json(dto::list_to_json(reviews)).into_response())
}

pub async fn create_review(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(place_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let place = common::fetch::<Place>(&ctx, &place_id)?;
    let attrs = dto::json_object(&body)?;
    let user_id = dto::require_id(&attrs, "user_id")?;
    dto::require(&attrs, "text")?;
    let user = common::fetch::<User>(&ctx, user_id.as_str())?;

    let mut review: Review = dto::build(attrs)?;
    review.place_id = place.id().clone();
    review.user_id = user.id().clone();
    common::insert(&ctx, review).await
}
