use std::sync::Arc;

use axum::{body::Bytes, extract::Extension};

use hbnb_core::Amenity;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn create_amenity(Extension(ctx): Extension<Arc<AppContext>>, body: Bytes) -> ApiResult {
    let attrs = dto::json_object(&body)?;
    dto::require(&attrs, "name")?;
    let amenity: Amenity = dto::build(attrs)?;

    let _guard = ctx.lock_writes().await;
    common::insert(&ctx, amenity).await
}
