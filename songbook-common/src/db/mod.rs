//! Database models, schema, and queries

pub mod init;
pub mod migrations;
pub mod models;
pub mod singers;
pub mod songs;

pub use init::*;
pub use migrations::{current_schema_version, get_schema_version, run_migrations};
pub use models::*;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::Result;

/// Begin a transaction holding the SQLite write lock from `BEGIN`.
///
/// Writes that read first must use this: a deferred transaction that has
/// read cannot be upgraded after another writer commits, and fails with
/// `SQLITE_BUSY` without waiting on the busy timeout.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
