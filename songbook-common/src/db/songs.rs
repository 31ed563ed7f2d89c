//! Song database operations
//!
//! A song always belongs to an existing singer. The existence check runs as
//! an explicit rule inside the write transaction so a bad `singer_id` comes
//! back as a field error on `singer_id`, not as a constraint failure.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::db::begin_write;
use crate::db::models::{json_to_db, Singer, Song, SONG_COLUMNS};
use crate::db::singers::{fetch_singer, singer_exists};
use crate::time;
use crate::validation::{Payload, Rule, SaveMode, SongChanges, ValidationErrors};
use crate::{Error, Result};

/// Table name, as reported in NotFound errors
pub const TABLE: &str = "songs";

/// All songs, ordered by id, each with its singer attached
pub async fn list_songs(pool: &SqlitePool) -> Result<Vec<Song>> {
    // Singer columns are aliased so they can't collide with song columns
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.title, s.singer_id, s.code, s.stroke, s.lyric, s.bpm, s.album,
               s.created, s.modified,
               g.name AS singer_name, g.created AS singer_created, g.modified AS singer_modified
        FROM songs s
        INNER JOIN singer g ON g.id = s.singer_id
        ORDER BY s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(song_with_singer).collect()
}

/// Load one song, optionally with its singer attached
pub async fn get_song(pool: &SqlitePool, id: i64, include_singer: bool) -> Result<Song> {
    let mut conn = pool.acquire().await?;

    let mut song = fetch_song(&mut conn, id)
        .await?
        .ok_or_else(|| Error::record_not_found(TABLE))?;

    if include_singer {
        let singer = fetch_singer(&mut conn, song.singer_id).await?.ok_or_else(|| {
            Error::Internal(format!("song {} references missing singer {}", id, song.singer_id))
        })?;
        song.singer = Some(Box::new(singer));
    }

    Ok(song)
}

/// Validate and insert a new song
pub async fn create_song(pool: &SqlitePool, payload: &Payload) -> Result<Song> {
    let changes = SongChanges::validate(payload, SaveMode::Create).inspect_err(|errors| {
        warn!("Rejected new song: {}", errors);
    })?;

    let (title, singer_id) = match (changes.title, changes.singer_id) {
        (Some(title), Some(singer_id)) => (title, singer_id),
        _ => {
            return Err(Error::Internal(
                "validated song lacks title or singer_id".to_string(),
            ))
        }
    };

    let now = time::now();
    let song = Song {
        id: 0,
        title,
        singer_id,
        code: changes.code.flatten(),
        stroke: changes.stroke.flatten(),
        lyric: changes.lyric.flatten(),
        bpm: changes.bpm.flatten(),
        album: changes.album.flatten(),
        created: changes.created.unwrap_or(now),
        modified: changes.modified.unwrap_or(now),
        singer: None,
    };

    let mut tx = begin_write(pool).await?;

    ensure_singer_exists(&mut tx, singer_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO songs (title, singer_id, code, stroke, lyric, bpm, album, created, modified)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&song.title)
    .bind(song.singer_id)
    .bind(json_to_db(&song.code))
    .bind(json_to_db(&song.stroke))
    .bind(&song.lyric)
    .bind(song.bpm)
    .bind(&song.album)
    .bind(time::to_db(&song.created))
    .bind(time::to_db(&song.modified))
    .execute(&mut *tx)
    .await
    .map_err(map_singer_fk_violation)?;

    tx.commit().await?;

    let song = Song {
        id: result.last_insert_rowid(),
        ..song
    };
    info!("Created song {} ({:?}) for singer {}", song.id, song.title, singer_id);

    Ok(song)
}

/// Apply the allow-listed fields of `payload` to an existing song
pub async fn update_song(pool: &SqlitePool, id: i64, payload: &Payload) -> Result<Song> {
    let mut tx = begin_write(pool).await?;

    let existing = fetch_song(&mut tx, id)
        .await?
        .ok_or_else(|| Error::record_not_found(TABLE))?;

    let changes = SongChanges::validate(payload, SaveMode::Update).inspect_err(|errors| {
        warn!("Rejected update of song {}: {}", id, errors);
    })?;

    if changes.is_empty() {
        debug!("Update of song {} carried no assignable fields", id);
        return Ok(existing);
    }

    if let Some(singer_id) = changes.singer_id {
        ensure_singer_exists(&mut tx, singer_id).await?;
    }

    let updated = Song {
        title: changes.title.unwrap_or(existing.title),
        singer_id: changes.singer_id.unwrap_or(existing.singer_id),
        code: changes.code.unwrap_or(existing.code),
        stroke: changes.stroke.unwrap_or(existing.stroke),
        lyric: changes.lyric.unwrap_or(existing.lyric),
        bpm: changes.bpm.unwrap_or(existing.bpm),
        album: changes.album.unwrap_or(existing.album),
        created: changes.created.unwrap_or(existing.created),
        modified: changes.modified.unwrap_or_else(time::now),
        ..existing
    };

    let result = sqlx::query(
        r#"
        UPDATE songs
        SET title = ?, singer_id = ?, code = ?, stroke = ?, lyric = ?, bpm = ?, album = ?,
            created = ?, modified = ?
        WHERE id = ?
        "#,
    )
    .bind(&updated.title)
    .bind(updated.singer_id)
    .bind(json_to_db(&updated.code))
    .bind(json_to_db(&updated.stroke))
    .bind(&updated.lyric)
    .bind(updated.bpm)
    .bind(&updated.album)
    .bind(time::to_db(&updated.created))
    .bind(time::to_db(&updated.modified))
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(map_singer_fk_violation)?;

    if result.rows_affected() == 0 {
        return Err(Error::record_not_found(TABLE));
    }

    tx.commit().await?;

    info!("Updated song {}", id);
    Ok(updated)
}

/// Delete one song
pub async fn delete_song(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = begin_write(pool).await?;

    if fetch_song(&mut tx, id).await?.is_none() {
        return Err(Error::record_not_found(TABLE));
    }

    let result = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::record_not_found(TABLE));
    }

    tx.commit().await?;

    info!("Deleted song {}", id);
    Ok(())
}

/// Referential rule: `singer_id` must name an existing singer
async fn ensure_singer_exists(conn: &mut SqliteConnection, singer_id: i64) -> Result<()> {
    if singer_exists(conn, singer_id).await? {
        Ok(())
    } else {
        warn!("Rejected song write: singer {} does not exist", singer_id);
        Err(ValidationErrors::single("singer_id", Rule::ExistsIn).into())
    }
}

/// A singer deleted between the rule check and the write still reports as
/// a `singer_id` field error
fn map_singer_fk_violation(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            ValidationErrors::single("singer_id", Rule::ExistsIn).into()
        }
        other => other.into(),
    }
}

async fn fetch_song(conn: &mut SqliteConnection, id: i64) -> Result<Option<Song>> {
    let row = sqlx::query(&format!("SELECT {} FROM songs WHERE id = ?", SONG_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(Song::from_row).transpose()
}

fn song_with_singer(row: &SqliteRow) -> Result<Song> {
    let mut song = Song::from_row(row)?;

    let created: String = row.try_get("singer_created")?;
    let modified: String = row.try_get("singer_modified")?;
    let parse = |text: &str| {
        time::from_db(text)
            .ok_or_else(|| Error::Internal(format!("Unparseable singer timestamp: {:?}", text)))
    };

    song.singer = Some(Box::new(Singer {
        id: song.singer_id,
        name: row.try_get("singer_name")?,
        created: parse(&created)?,
        modified: parse(&modified)?,
        songs: None,
    }));

    Ok(song)
}
