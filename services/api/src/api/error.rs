//! HTTP error body and the helpers handlers use to build it.
//!
//! Every failure leaves the service as `{ code, message, request_id }` with a
//! status that matches `code`:
//!
//! | status | code |
//! |---|---|
//! | 400 | `validation_error` |
//! | 401 | `unauthorized` |
//! | 403 | `forbidden` |
//! | 404 | `not_found` |
//! | 409 | `already_exists`, `invalid_transition`, `grid_not_open` |
//! | 500 | `internal` |
//!
//! Storage details are logged, never returned. A row hidden by a row policy
//! is reported as 404 so callers cannot probe for ids they may not see.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Handler error; converts into a JSON response.
///
/// ```rust
/// use axum::http::StatusCode;
/// use shovel_api::api::error::api_not_found;
///
/// let err = api_not_found("grid not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// assert_eq!(err.body.code, "not_found");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// 409 with a caller-chosen `code`.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Log `err` and return a generic 500.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "relief storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Translate a store failure for the named record kind.
///
/// `NotFound` becomes `"{what} not found"`; `Unexpected` is logged and
/// becomes a 500. The rest map one-to-one onto 403 and 409 responses.
pub fn api_store_error(what: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(_) => api_not_found(&format!("{what} not found")),
        StoreError::Conflict(detail) => api_conflict("already_exists", &detail),
        StoreError::Forbidden(_) => api_forbidden(&format!("not allowed to modify this {what}")),
        StoreError::InvalidTransition(detail) => api_conflict("invalid_transition", &detail),
        err @ StoreError::Unexpected(_) => api_internal(&format!("failed to access {what}"), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_pair_status_with_code() {
        let cases = [
            (api_not_found("m"), StatusCode::NOT_FOUND, "not_found"),
            (api_conflict("grid_not_open", "m"), StatusCode::CONFLICT, "grid_not_open"),
            (api_unauthorized("m"), StatusCode::UNAUTHORIZED, "unauthorized"),
            (api_forbidden("m"), StatusCode::FORBIDDEN, "forbidden"),
            (api_validation_error("m"), StatusCode::BAD_REQUEST, "validation_error"),
            (api_internal_message("m"), StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status, status);
            assert_eq!(err.body.code, code);
            assert_eq!(err.body.message, "m");
            assert!(err.body.request_id.is_none());
        }
    }

    #[test]
    fn internal_errors_hide_storage_detail() {
        let err = StoreError::Unexpected(anyhow::anyhow!("password authentication failed"));
        let api = api_internal("failed to load user", &err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.message, "failed to load user");
    }

    #[test]
    fn store_errors_map_by_kind() {
        let cases = [
            (StoreError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (StoreError::Conflict("x".into()), StatusCode::CONFLICT, "already_exists"),
            (StoreError::Forbidden("x".into()), StatusCode::FORBIDDEN, "forbidden"),
            (
                StoreError::InvalidTransition("x".into()),
                StatusCode::CONFLICT,
                "invalid_transition",
            ),
            (
                StoreError::Unexpected(anyhow::anyhow!("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let api = api_store_error("grid", err);
            assert_eq!(api.status, status);
            assert_eq!(api.body.code, code);
        }
        let api = api_store_error("grid", StoreError::NotFound("row".into()));
        assert_eq!(api.body.message, "grid not found");
    }
}
