//! HTTP API application wiring (Axum router + shared context).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request body parsing and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::{Layer, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

use hbnb_infra::Storage;

use crate::context::AppContext;

pub mod dto;
pub mod errors;
pub mod routes;

/// The served application: the router behind trailing-slash normalization.
///
/// Normalization has to run before routing, so it wraps the router instead
/// of being a router layer. Serve it with
/// `axum::ServiceExt::<axum::extract::Request>::into_make_service(app)`.
pub type App = NormalizePath<Router>;

/// Build the full HTTP app (public entrypoint used by `main.rs` and the
/// black-box tests). The storage is expected to be reloaded already.
pub fn build_app(storage: Arc<dyn Storage>) -> App {
    NormalizePathLayer::trim_trailing_slash().layer(router(storage))
}

fn router(storage: Arc<dyn Storage>) -> Router {
    let ctx = Arc::new(AppContext::new(storage));

    Router::new()
        .nest("/api/v1", routes::router())
        .fallback(routes::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(Extension(ctx)),
        )
}
