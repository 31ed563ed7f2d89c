//! Singer endpoints
//!
//! `store` is the JSON-API style create. `add`, `edit` and `delete` are the
//! form-style actions answering with a flash and a redirect to the index.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use songbook_common::db::{singers, Singer, SingerSummary};
use songbook_common::Error;
use tracing::warn;

use crate::api::flash::{self, Flash};
use crate::api::{Payload, RecordId};
use crate::error::ApiError;
use crate::AppState;

const INDEX: &str = "/singers";

/// GET /singers
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<SingerSummary>>, ApiError> {
    Ok(Json(singers::list_singers(&state.db).await?))
}

/// POST /singers
pub async fn store(
    State(state): State<AppState>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    match singers::create_singer(&state.db, &payload).await {
        Ok(singer) => Ok(Json(json!({
            "message": "Singer created successfully",
            "singer": singer,
        }))
        .into_response()),
        Err(Error::Validation(errors)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Unable to create singer",
                "errors": errors,
            })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// GET /singers/:id
pub async fn view(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Singer>, ApiError> {
    Ok(Json(singers::get_singer(&state.db, id, true).await?))
}

/// GET /singers/:id/edit
pub async fn edit_form(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Singer>, ApiError> {
    Ok(Json(singers::get_singer(&state.db, id, false).await?))
}

/// POST /singers/add
pub async fn add(
    State(state): State<AppState>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    saved(singers::create_singer(&state.db, &payload).await)
}

/// PUT|PATCH /singers/:id, POST /singers/:id/edit
pub async fn edit(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    saved(singers::update_singer(&state.db, id, &payload).await)
}

/// DELETE /singers/:id, POST /singers/:id/delete
pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Response, ApiError> {
    match singers::delete_singer(&state.db, id).await {
        Ok(()) => Ok(flash::redirect(
            INDEX,
            Flash::success("The singer has been deleted."),
        )),
        Err(Error::NotFound(message)) => Err(ApiError::NotFound(message)),
        Err(e) => {
            warn!("Failed to delete singer {}: {}", id, e);
            Ok(flash::redirect(
                INDEX,
                Flash::error("The singer could not be deleted. Please, try again."),
            ))
        }
    }
}

fn saved(result: songbook_common::Result<Singer>) -> Result<Response, ApiError> {
    match result {
        Ok(_) => Ok(flash::redirect(
            INDEX,
            Flash::success("The singer has been saved."),
        )),
        Err(Error::Validation(errors)) => Ok(flash::rejected(
            Flash::error("The singer could not be saved. Please, try again."),
            errors,
        )),
        Err(e) => Err(e.into()),
    }
}
