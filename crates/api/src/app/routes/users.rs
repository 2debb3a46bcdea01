use std::sync::Arc;

use axum::{body::Bytes, extract::Extension};

use hbnb_core::User;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn create_user(Extension(ctx): Extension<Arc<AppContext>>, body: Bytes) -> ApiResult {
    let attrs = dto::json_object(&body)?;
    dto::require(&attrs, "email")?;
    dto::require(&attrs, "password")?;
    let user: User = dto::build(attrs)?;

    let _guard = ctx.lock_writes().await;
    common::insert(&ctx, user).await
}
