//! # Songbook Common Library
//!
//! Shared code for the Songbook service:
//! - Singer/Song models and their repository queries
//! - Field validation and mass-assignment allow-lists
//! - Database initialization and schema migrations
//! - Configuration loading
//! - Error types and timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
