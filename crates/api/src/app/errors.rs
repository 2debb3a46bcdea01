use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use hbnb_core::{DomainError, EntityKind};
use hbnb_infra::StorageError;

pub type ApiResult<T = Response> = Result<T, ApiError>;

/// Failure surfaced to API clients as `{"error": code, "message": text}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl ApiError {
    pub fn not_found(kind: EntityKind) -> Self {
        Self::NotFound(format!("{kind} not found"))
    }

    pub fn not_a_json() -> Self {
        Self::InvalidInput("Not a JSON".to_string())
    }

    pub fn missing(field: &str) -> Self {
        Self::InvalidInput(format!("Missing {field}"))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::InvalidInput(msg),
            other => ApiError::InvalidInput(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::Persistence(e) => {
                error!(error = %e, transient = e.is_transient(), "persistence failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_failure",
                    e.to_string(),
                )
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_validation_maps_to_invalid_input() {
        let err: ApiError = DomainError::validation("City: bad name").into();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "City: bad name"));
    }

    #[test]
    fn every_domain_error_is_a_client_error() {
        for err in [
            DomainError::validation("bad"),
            DomainError::invalid_id("EntityId: empty"),
            DomainError::invalid_timestamp("yesterday"),
        ] {
            let status = ApiError::from(err).into_response().status();
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::not_found(EntityKind::State).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::not_a_json().into_response().status(), StatusCode::BAD_REQUEST);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert_eq!(
            ApiError::from(StorageError::io("save", io)).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
