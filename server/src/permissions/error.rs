//! Access-control error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AccessError {
    /// Referenced role, module or id(s) do not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("{0}")]
    Duplicate(String),

    /// A requested action is not in its module's catalog, or the module has none.
    #[error("{0}")]
    InvalidGrant(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// No caller identity was attached to the request.
    #[error("Access Denied")]
    Unauthenticated,

    /// The caller's role does not grant the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict(constraint) if constraint.ends_with("_name") => {
                Self::Duplicate("duplicate name".into())
            }
            StoreError::Conflict(constraint) => {
                Self::Duplicate(format!("duplicate record ({constraint})"))
            }
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Duplicate(_) => (StatusCode::CONFLICT, "duplicate"),
            Self::InvalidGrant(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_grant"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Store(StoreError::DeadlineExceeded) => {
                (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded")
            }
            Self::Store(StoreError::Canceled) => (StatusCode::SERVICE_UNAVAILABLE, "canceled"),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };

        let message = match &self {
            Self::Store(StoreError::DeadlineExceeded | StoreError::Canceled) => self.to_string(),
            Self::Store(err) => {
                tracing::error!(error = %err, "Access-control store error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err = AccessError::from(StoreError::NotFound {
            resource: "role",
            id: 3,
        });
        assert!(matches!(err, AccessError::NotFound(ref m) if m == "role record not found"));
    }

    #[test]
    fn test_name_conflict_maps_to_duplicate() {
        let err = AccessError::from(StoreError::Conflict("idx_roles_name".into()));
        assert!(matches!(err, AccessError::Duplicate(ref m) if m == "duplicate name"));
    }

    #[test]
    fn test_deadline_stays_a_store_error() {
        let err = AccessError::from(StoreError::DeadlineExceeded);
        assert!(matches!(err, AccessError::Store(StoreError::DeadlineExceeded)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AccessError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AccessError::Duplicate("x".into()), StatusCode::CONFLICT),
            (
                AccessError::InvalidGrant("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AccessError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AccessError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AccessError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                AccessError::Store(StoreError::DeadlineExceeded),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                AccessError::Store(StoreError::Conflict("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
