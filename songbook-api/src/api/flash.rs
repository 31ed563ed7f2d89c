//! Redirect-with-flash responses for the form-style actions

use axum::{
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use songbook_common::validation::ValidationErrors;

/// Flash message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot status message shown after a redirect
#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    #[serde(rename = "type")]
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// 303 See Other to `location`, with the flash in the body
pub fn redirect(location: &str, flash: Flash) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, location.to_string())],
        Json(json!({ "flash": flash, "redirect": location })),
    )
        .into_response()
}

/// 400 with the flash and field errors, for a form to re-render
pub fn rejected(flash: Flash, errors: ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "flash": flash, "errors": errors })),
    )
        .into_response()
}
