//! Database models
//!
//! One struct per row shape. Associations are plain optional fields, filled
//! only when the caller asked for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::{time, Error, Result};

/// Performer owning zero or more songs (`singer` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Singer {
    pub id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Owned songs, present only when loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub songs: Option<Vec<Song>>,
}

/// List projection of a singer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingerSummary {
    pub id: i64,
    pub name: String,
}

/// One musical piece belonging to exactly one singer (`songs` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub singer_id: i64,
    /// Musical notation data, stored as JSON
    pub code: Option<Value>,
    /// Strumming pattern data, stored as JSON
    pub stroke: Option<Value>,
    pub lyric: Option<String>,
    pub bpm: Option<i64>,
    pub album: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Owning singer, present only when loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singer: Option<Box<Singer>>,
}

/// Column list for `singer` selects, in `Singer::from_row` order
pub(crate) const SINGER_COLUMNS: &str = "id, name, created, modified";

/// Column list for `songs` selects
pub(crate) const SONG_COLUMNS: &str =
    "id, title, singer_id, code, stroke, lyric, bpm, album, created, modified";

impl Singer {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Singer {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created: timestamp_column(row, "created")?,
            modified: timestamp_column(row, "modified")?,
            songs: None,
        })
    }

    /// Summary view used by list endpoints
    pub fn summary(&self) -> SingerSummary {
        SingerSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

impl Song {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Song {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            singer_id: row.try_get("singer_id")?,
            code: json_column(row, "code")?,
            stroke: json_column(row, "stroke")?,
            lyric: row.try_get("lyric")?,
            bpm: row.try_get("bpm")?,
            album: row.try_get("album")?,
            created: timestamp_column(row, "created")?,
            modified: timestamp_column(row, "modified")?,
            singer: None,
        })
    }
}

fn timestamp_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let text: String = row.try_get(column)?;
    time::from_db(&text).ok_or_else(|| {
        Error::Internal(format!("Unparseable timestamp in column {}: {:?}", column, text))
    })
}

/// JSON text column. Text that does not parse as JSON is returned as a
/// plain string value.
fn json_column(row: &SqliteRow, column: &str) -> Result<Option<Value>> {
    let text: Option<String> = row.try_get(column)?;
    Ok(text.map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text))))
}

/// Encode an optional JSON value for a JSON text column
pub(crate) fn json_to_db(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::to_string)
}
