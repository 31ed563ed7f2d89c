//! HTTP error mapping
//!
//! Errors reach the client as `{"error": message}` JSON with a matching
//! status code. Validation failures also carry the field error map.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use songbook_common::validation::ValidationErrors;
use songbook_common::Error;
use tracing::error;

/// API errors
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (bad body, wrong content type)
    BadRequest(String),
    /// Requested record does not exist
    NotFound(String),
    /// Submitted data failed validation
    Validation(ValidationErrors),
    /// Storage or other server-side failure
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => ApiError::NotFound(message),
            Error::Validation(errors) => ApiError::Validation(errors),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation failed", "errors": errors })),
            )
                .into_response(),
            ApiError::Internal(message) => {
                error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songbook_common::validation::Rule;

    #[test]
    fn test_common_errors_map_to_status() {
        let cases = [
            (Error::record_not_found("singer"), StatusCode::NOT_FOUND),
            (
                Error::Validation(ValidationErrors::single("name", Rule::Empty)),
                StatusCode::BAD_REQUEST,
            ),
            (Error::Internal("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Config("bad".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
