//! HTTP API handlers for songbook-api

pub mod flash;
pub mod health;
pub mod payload;
pub mod record_id;
pub mod singers;
pub mod songs;

pub use health::health_routes;
pub use payload::Payload;
pub use record_id::RecordId;
