//! Timestamp utilities
//!
//! Row timestamps are kept at whole-second precision, matching the
//! `YYYY-MM-DD HH:MM:SS` text that SQLite's `CURRENT_TIMESTAMP` produces.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

/// Storage format for DATETIME columns
pub const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current UTC timestamp, truncated to whole seconds
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Render a timestamp for a DATETIME column
pub fn to_db(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(DB_DATETIME_FORMAT).to_string()
}

/// Parse a DATETIME column value (stored as UTC without offset)
pub fn from_db(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DB_DATETIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a client-supplied timestamp.
///
/// Accepts RFC 3339 (`2025-12-12T10:46:08+00:00`) or the storage format
/// (`2025-12-12 10:46:08`, read as UTC). Sub-second parts are dropped.
pub fn parse_client(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(0))
        .or_else(|| from_db(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(now().nanosecond(), 0);
    }

    #[test]
    fn test_db_format_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 12, 10, 46, 8).unwrap();
        assert_eq!(to_db(&ts), "2025-12-12 10:46:08");
        assert_eq!(from_db("2025-12-12 10:46:08"), Some(ts));
    }

    #[test]
    fn test_parse_client_accepts_rfc3339_with_offset() {
        let parsed = parse_client("2025-12-12T12:46:08.250+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 12, 12, 10, 46, 8).unwrap());
    }

    #[test]
    fn test_parse_client_rejects_garbage() {
        assert!(parse_client("yesterday").is_none());
        assert!(parse_client("").is_none());
    }
}
