//! Singer database operations
//!
//! Every write validates first, then runs inside one transaction. Deleting a
//! singer relies on the `songs.singer_id` foreign key to cascade.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::db::begin_write;
use crate::db::models::{Singer, SingerSummary, Song, SINGER_COLUMNS, SONG_COLUMNS};
use crate::time;
use crate::validation::{Payload, SaveMode, SingerChanges};
use crate::{Error, Result};

/// Table name, as reported in NotFound errors
pub const TABLE: &str = "singer";

/// All singers, ordered by id, in list projection
pub async fn list_singers(pool: &SqlitePool) -> Result<Vec<SingerSummary>> {
    let singers = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM singer ORDER BY id")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(id, name)| SingerSummary { id, name })
        .collect();

    Ok(singers)
}

/// Singers for a picker, ordered by name, at most `limit` entries
pub async fn list_singer_options(pool: &SqlitePool, limit: i64) -> Result<Vec<SingerSummary>> {
    let singers = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, name FROM singer ORDER BY name COLLATE NOCASE, id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, name)| SingerSummary { id, name })
    .collect();

    Ok(singers)
}

/// Load one singer, optionally with its songs attached
pub async fn get_singer(pool: &SqlitePool, id: i64, include_songs: bool) -> Result<Singer> {
    let mut conn = pool.acquire().await?;

    let mut singer = fetch_singer(&mut conn, id)
        .await?
        .ok_or_else(|| Error::record_not_found(TABLE))?;

    if include_songs {
        singer.songs = Some(fetch_songs_of(&mut conn, id).await?);
    }

    Ok(singer)
}

/// Validate and insert a new singer
pub async fn create_singer(pool: &SqlitePool, payload: &Payload) -> Result<Singer> {
    let changes = SingerChanges::validate(payload, SaveMode::Create).inspect_err(|errors| {
        warn!("Rejected new singer: {}", errors);
    })?;

    let name = changes
        .name
        .ok_or_else(|| Error::Internal("validated singer has no name".to_string()))?;
    let now = time::now();
    let created = changes.created.unwrap_or(now);
    let modified = changes.modified.unwrap_or(now);

    let mut tx = begin_write(pool).await?;

    let id = sqlx::query("INSERT INTO singer (name, created, modified) VALUES (?, ?, ?)")
        .bind(&name)
        .bind(time::to_db(&created))
        .bind(time::to_db(&modified))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    info!("Created singer {} ({:?})", id, name);

    Ok(Singer {
        id,
        name,
        created,
        modified,
        songs: None,
    })
}

/// Apply the allow-listed fields of `payload` to an existing singer
pub async fn update_singer(pool: &SqlitePool, id: i64, payload: &Payload) -> Result<Singer> {
    let mut tx = begin_write(pool).await?;

    let existing = fetch_singer(&mut tx, id)
        .await?
        .ok_or_else(|| Error::record_not_found(TABLE))?;

    let changes = SingerChanges::validate(payload, SaveMode::Update).inspect_err(|errors| {
        warn!("Rejected update of singer {}: {}", id, errors);
    })?;

    if changes.is_empty() {
        debug!("Update of singer {} carried no assignable fields", id);
        return Ok(existing);
    }

    let updated = Singer {
        name: changes.name.unwrap_or(existing.name),
        created: changes.created.unwrap_or(existing.created),
        modified: changes.modified.unwrap_or_else(time::now),
        ..existing
    };

    let result = sqlx::query("UPDATE singer SET name = ?, created = ?, modified = ? WHERE id = ?")
        .bind(&updated.name)
        .bind(time::to_db(&updated.created))
        .bind(time::to_db(&updated.modified))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::record_not_found(TABLE));
    }

    tx.commit().await?;

    info!("Updated singer {}", id);
    Ok(updated)
}

/// Delete a singer; its songs go with it
pub async fn delete_singer(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = begin_write(pool).await?;

    if fetch_singer(&mut tx, id).await?.is_none() {
        return Err(Error::record_not_found(TABLE));
    }

    let owned_songs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs WHERE singer_id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM singer WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    // A concurrent delete may have won the race
    if result.rows_affected() == 0 {
        return Err(Error::record_not_found(TABLE));
    }

    tx.commit().await?;

    info!("Deleted singer {} ({} songs cascaded)", id, owned_songs);
    Ok(())
}

/// True if a singer with `id` exists
pub(crate) async fn singer_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM singer WHERE id = ?)")
        .bind(id)
        .fetch_one(conn)
        .await?;

    Ok(exists)
}

pub(crate) async fn fetch_singer(conn: &mut SqliteConnection, id: i64) -> Result<Option<Singer>> {
    let row = sqlx::query(&format!("SELECT {} FROM singer WHERE id = ?", SINGER_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(Singer::from_row).transpose()
}

async fn fetch_songs_of(conn: &mut SqliteConnection, singer_id: i64) -> Result<Vec<Song>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM songs WHERE singer_id = ? ORDER BY id",
        SONG_COLUMNS
    ))
    .bind(singer_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(Song::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::validation::Rule;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().expect("object payload")
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_singer() {
        let pool = init_memory_database().await.unwrap();

        let created = create_singer(&pool, &payload(json!({ "name": "Test" })))
            .await
            .expect("create should succeed");
        assert_eq!(created.name, "Test");
        assert_eq!(created.created, created.modified);

        let loaded = get_singer(&pool, created.id, false).await.unwrap();
        assert_eq!(loaded, created);
        assert!(loaded.songs.is_none());
    }

    #[tokio::test]
    async fn test_create_with_empty_name_writes_nothing() {
        let pool = init_memory_database().await.unwrap();

        let err = create_singer(&pool, &payload(json!({ "name": "" })))
            .await
            .unwrap_err();
        match err {
            Error::Validation(errors) => assert!(errors.has("name", Rule::Empty)),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(count(&pool, "singer").await, 0);
    }

    #[tokio::test]
    async fn test_create_with_false_name_writes_nothing() {
        let pool = init_memory_database().await.unwrap();

        let err = create_singer(&pool, &payload(json!({ "name": false })))
            .await
            .unwrap_err();
        match err {
            Error::Validation(errors) => assert!(errors.has("name", Rule::Empty)),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(count(&pool, "singer").await, 0);
    }

    #[tokio::test]
    async fn test_get_missing_singer_is_not_found() {
        let pool = init_memory_database().await.unwrap();

        let err = get_singer(&pool, 1, true).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "Record not found in table \"singer\"");
    }

    #[tokio::test]
    async fn test_list_singers_in_id_order() {
        let pool = init_memory_database().await.unwrap();
        for name in ["Zoe", "Adele", "Mika"] {
            create_singer(&pool, &payload(json!({ "name": name }))).await.unwrap();
        }

        let names: Vec<String> = list_singers(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Zoe", "Adele", "Mika"]);

        let options: Vec<String> = list_singer_options(&pool, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(options, vec!["Adele", "Mika"]);
    }

    #[tokio::test]
    async fn test_update_ignores_unlisted_fields() {
        let pool = init_memory_database().await.unwrap();
        let singer = create_singer(&pool, &payload(json!({ "name": "Before" })))
            .await
            .unwrap();

        let updated = update_singer(
            &pool,
            singer.id,
            &payload(json!({ "id": 500, "name": "After" })),
        )
        .await
        .unwrap();

        assert_eq!(updated.id, singer.id);
        assert_eq!(updated.name, "After");
        assert_eq!(updated.created, singer.created);
        assert!(get_singer(&pool, 500, false).await.is_err());
    }

    #[tokio::test]
    async fn test_update_without_assignable_fields_is_noop() {
        let pool = init_memory_database().await.unwrap();
        let singer = create_singer(
            &pool,
            &payload(json!({ "name": "Same", "modified": "2020-01-01 00:00:00" })),
        )
        .await
        .unwrap();

        let unchanged = update_singer(&pool, singer.id, &payload(json!({ "bogus": 1 })))
            .await
            .unwrap();
        assert_eq!(unchanged, singer);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_name() {
        let pool = init_memory_database().await.unwrap();
        let singer = create_singer(&pool, &payload(json!({ "name": "Kept" })))
            .await
            .unwrap();

        let err = update_singer(&pool, singer.id, &payload(json!({ "name": "" })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(get_singer(&pool, singer.id, false).await.unwrap().name, "Kept");
    }

    #[tokio::test]
    async fn test_update_missing_singer_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let err = update_singer(&pool, 7, &payload(json!({ "name": "X" })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let pool = init_memory_database().await.unwrap();
        let singer = create_singer(&pool, &payload(json!({ "name": "Gone" })))
            .await
            .unwrap();

        delete_singer(&pool, singer.id).await.unwrap();
        let err = delete_singer(&pool, singer.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
