//! songbook-api library - HTTP surface for singers and songs

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let singers = Router::new()
        .route(
            "/singers",
            get(api::singers::index).post(api::singers::store),
        )
        .route("/singers/add", post(api::singers::add))
        .route(
            "/singers/:id",
            get(api::singers::view)
                .put(api::singers::edit)
                .patch(api::singers::edit)
                .delete(api::singers::delete),
        )
        .route(
            "/singers/:id/edit",
            get(api::singers::edit_form)
                .post(api::singers::edit)
                .put(api::singers::edit)
                .patch(api::singers::edit),
        )
        .route(
            "/singers/:id/delete",
            post(api::singers::delete).delete(api::singers::delete),
        );

    let songs = Router::new()
        .route("/songs", get(api::songs::index).post(api::songs::store))
        .route(
            "/songs/add",
            get(api::songs::add_form).post(api::songs::add),
        )
        .route(
            "/songs/:id",
            get(api::songs::view)
                .put(api::songs::edit)
                .patch(api::songs::edit)
                .delete(api::songs::delete),
        )
        .route(
            "/songs/:id/edit",
            get(api::songs::edit_form)
                .post(api::songs::edit)
                .put(api::songs::edit)
                .patch(api::songs::edit),
        )
        .route(
            "/songs/:id/delete",
            post(api::songs::delete).delete(api::songs::delete),
        );

    Router::new()
        .merge(singers)
        .merge(songs)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
