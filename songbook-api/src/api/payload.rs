//! Request body extraction
//!
//! Write endpoints accept either a JSON object or an urlencoded form. Form
//! values arrive as strings; validation already accepts numeric strings
//! wherever an integer is expected.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::Value;
use songbook_common::validation;

use crate::error::ApiError;

/// Submitted fields, before allow-listing and validation
#[derive(Debug, Clone)]
pub struct Payload(pub validation::Payload);

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&request) {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            return Ok(Payload(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ));
        }

        let Json(value) = Json::<Value>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        match value {
            Value::Object(fields) => Ok(Payload(fields)),
            _ => Err(ApiError::BadRequest(
                "Request body must be a JSON object".to_string(),
            )),
        }
    }
}
