//! Song endpoints
//!
//! Same action set as singers. The add and edit forms also need the singer
//! picker, served capped and ordered by name.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use songbook_common::db::{singers, songs, SingerSummary, Song};
use songbook_common::Error;
use tracing::warn;

use crate::api::flash::{self, Flash};
use crate::api::{Payload, RecordId};
use crate::error::ApiError;
use crate::AppState;

const INDEX: &str = "/songs";

/// Upper bound on singers offered by the song forms
pub const SINGER_OPTIONS_LIMIT: i64 = 200;

#[derive(Debug, Serialize)]
pub struct SongList {
    pub songs: Vec<Song>,
}

#[derive(Debug, Serialize)]
pub struct SongForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
    pub singers: Vec<SingerSummary>,
}

/// GET /songs
pub async fn index(State(state): State<AppState>) -> Result<Json<SongList>, ApiError> {
    Ok(Json(SongList {
        songs: songs::list_songs(&state.db).await?,
    }))
}

/// POST /songs
pub async fn store(
    State(state): State<AppState>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    match songs::create_song(&state.db, &payload).await {
        Ok(song) => Ok(Json(json!({
            "message": "Song created successfully",
            "song": song,
        }))
        .into_response()),
        Err(Error::Validation(errors)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Unable to create song",
                "errors": errors,
            })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// GET /songs/:id
pub async fn view(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Song>, ApiError> {
    Ok(Json(songs::get_song(&state.db, id, true).await?))
}

/// GET /songs/add
pub async fn add_form(State(state): State<AppState>) -> Result<Json<SongForm>, ApiError> {
    Ok(Json(SongForm {
        song: None,
        singers: singers::list_singer_options(&state.db, SINGER_OPTIONS_LIMIT).await?,
    }))
}

/// GET /songs/:id/edit
pub async fn edit_form(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<SongForm>, ApiError> {
    let song = songs::get_song(&state.db, id, false).await?;
    let singers = singers::list_singer_options(&state.db, SINGER_OPTIONS_LIMIT).await?;

    Ok(Json(SongForm {
        song: Some(song),
        singers,
    }))
}

/// POST /songs/add
pub async fn add(
    State(state): State<AppState>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    saved(songs::create_song(&state.db, &payload).await)
}

/// PUT|PATCH /songs/:id, POST /songs/:id/edit
pub async fn edit(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    saved(songs::update_song(&state.db, id, &payload).await)
}

/// DELETE /songs/:id, POST /songs/:id/delete
pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Response, ApiError> {
    match songs::delete_song(&state.db, id).await {
        Ok(()) => Ok(flash::redirect(
            INDEX,
            Flash::success("The song has been deleted."),
        )),
        Err(Error::NotFound(message)) => Err(ApiError::NotFound(message)),
        Err(e) => {
            warn!("Failed to delete song {}: {}", id, e);
            Ok(flash::redirect(
                INDEX,
                Flash::error("The song could not be deleted. Please, try again."),
            ))
        }
    }
}

fn saved(result: songbook_common::Result<Song>) -> Result<Response, ApiError> {
    match result {
        Ok(_) => Ok(flash::redirect(
            INDEX,
            Flash::success("The song has been saved."),
        )),
        Err(Error::Validation(errors)) => Ok(flash::rejected(
            Flash::error("The song could not be saved. Please, try again."),
            errors,
        )),
        Err(e) => Err(e.into()),
    }
}
