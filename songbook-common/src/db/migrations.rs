//! Database schema migrations
//!
//! Versioned, append-only migrations tracked in the `schema_version` table.
//! Each migration runs in its own transaction together with the version
//! bump, so a failed migration leaves no half-applied schema behind.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field have already applied them
//! 2. **Always add new migrations** - append to `MIGRATIONS` and let the version follow
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::db::begin_write;
use crate::Result;

/// One schema step
struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

/// All migrations, in version order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create singer table",
        statements: &[r#"
            CREATE TABLE singer (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                created DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                modified DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#],
    },
    Migration {
        version: 2,
        description: "Create songs table",
        statements: &[
            r#"
            CREATE TABLE songs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                singer_id INTEGER NOT NULL
                    REFERENCES singer (id) ON DELETE CASCADE ON UPDATE NO ACTION,
                code JSON NULL,
                stroke JSON NULL,
                lyric TEXT NULL,
                bpm INTEGER NULL,
                album VARCHAR(255) NULL,
                created DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                modified DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            "CREATE INDEX songs_singer_id ON songs (singer_id)",
        ],
    },
];

/// Schema version the code expects
pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Get current schema version from database
///
/// Returns 0 if no migration has been recorded yet
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Run all pending migrations. Safe to call on every start-up.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    let current_version = get_schema_version(pool).await?;
    let target_version = current_schema_version();

    if current_version == target_version {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > target_version {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, target_version
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, target_version
    );

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        let mut tx = begin_write(pool).await?;
        apply(&mut tx, migration).await?;
        tx.commit().await?;
        info!("✓ Migration v{} completed: {}", migration.version, migration.description);
    }

    Ok(())
}

async fn apply(tx: &mut Transaction<'_, Sqlite>, migration: &Migration) -> Result<()> {
    for statement in migration.statements {
        sqlx::query(*statement).execute(&mut **tx).await?;
    }

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(migration.version)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_versions_are_sequential() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, index as i64 + 1);
        }
        assert_eq!(current_schema_version(), 2);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = crate::db::init_memory_database().await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), 2);

        run_migrations(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn test_songs_foreign_key_cascades() {
        let pool = crate::db::init_memory_database().await.unwrap();

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"SELECT "table", "to", on_delete FROM pragma_foreign_key_list('songs')"#,
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(
            rows,
            vec![("singer".to_string(), "id".to_string(), "CASCADE".to_string())]
        );
    }
}
