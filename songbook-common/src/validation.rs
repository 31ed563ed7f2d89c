//! Field validation and mass-assignment allow-lists
//!
//! Every write goes through a change set (`SingerChanges`, `SongChanges`)
//! built by a pure `validate` function. Only allow-listed keys are read from
//! the submitted payload; anything else (`id`, unknown keys) is dropped
//! without error. Validation never touches the database: rules that need
//! storage (the singer existence check) live in the repository modules and
//! run only once field validation has passed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::time;

/// Raw submitted data, as decoded from a JSON object or a form body
pub type Payload = Map<String, Value>;

/// Maximum length (in characters) of `name`, `title` and `album`
pub const MAX_TEXT_LENGTH: usize = 255;

/// Whether a change set is for a new record or an existing one.
///
/// Presence requirements apply to `Create` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Update,
}

/// A failed validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Empty,
    Scalar,
    Integer,
    MaxLength(usize),
    DateTime,
    ExistsIn,
}

impl Rule {
    /// Key under which the rule is reported
    pub fn key(&self) -> &'static str {
        match self {
            Rule::Required => "_required",
            Rule::Empty => "_empty",
            Rule::Scalar => "scalar",
            Rule::Integer => "integer",
            Rule::MaxLength(_) => "maxLength",
            Rule::DateTime => "dateTime",
            Rule::ExistsIn => "_existsIn",
        }
    }

    /// Human-readable message for the rule
    pub fn message(&self) -> String {
        match self {
            Rule::Required => "This field is required".to_string(),
            Rule::Empty => "This field cannot be left empty".to_string(),
            Rule::Scalar => "The provided value must be scalar".to_string(),
            Rule::Integer => "The provided value must be an integer".to_string(),
            Rule::MaxLength(max) => {
                format!("The provided value must be at most `{}` characters long", max)
            }
            Rule::DateTime => "The provided value must be a date and time".to_string(),
            Rule::ExistsIn => "This value does not exist".to_string(),
        }
    }
}

/// Field-keyed validation errors: `field -> rule key -> message`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, BTreeMap<String, String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors consisting of one failed rule
    pub fn single(field: &str, rule: Rule) -> Self {
        let mut errors = Self::new();
        errors.add(field, rule);
        errors
    }

    pub fn add(&mut self, field: &str, rule: Rule) {
        self.0
            .entry(field.to_string())
            .or_default()
            .insert(rule.key().to_string(), rule.message());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `field` has at least one error
    pub fn has_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// True if `field` failed `rule`
    pub fn has(&self, field: &str, rule: Rule) -> bool {
        self.0
            .get(field)
            .is_some_and(|rules| rules.contains_key(rule.key()))
    }

    /// Names of the fields that failed, in order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, rules) in &self.0 {
            for message in rules.values() {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Allow-listed change set for a Singer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingerChanges {
    pub name: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl SingerChanges {
    /// Fields a payload may assign
    pub const ACCESSIBLE_FIELDS: &'static [&'static str] = &["name", "created", "modified"];

    /// Validate a payload and extract the allow-listed fields.
    ///
    /// `name`: required on create, non-empty, scalar, at most 255 characters.
    pub fn validate(payload: &Payload, mode: SaveMode) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let changes = SingerChanges {
            name: required_text(payload, "name", mode, &mut errors),
            created: optional_timestamp(payload, "created", &mut errors),
            modified: optional_timestamp(payload, "modified", &mut errors),
        };

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }

    /// True if the payload carried nothing assignable
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.created.is_none() && self.modified.is_none()
    }
}

/// Allow-listed change set for a Song.
///
/// For nullable columns the outer `Option` tells whether the field was
/// submitted at all, the inner one whether it was submitted empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongChanges {
    pub title: Option<String>,
    pub singer_id: Option<i64>,
    pub code: Option<Option<Value>>,
    pub stroke: Option<Option<Value>>,
    pub lyric: Option<Option<String>>,
    pub bpm: Option<Option<i64>>,
    pub album: Option<Option<String>>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl SongChanges {
    /// Fields a payload may assign.
    ///
    /// `singer` is accessible but carries association data, which is only
    /// ever written through the singer endpoints.
    pub const ACCESSIBLE_FIELDS: &'static [&'static str] = &[
        "title",
        "singer_id",
        "code",
        "stroke",
        "lyric",
        "bpm",
        "album",
        "created",
        "modified",
        "singer",
    ];

    /// Validate a payload and extract the allow-listed fields.
    ///
    /// - `title`: required on create, non-empty, scalar, at most 255 characters
    /// - `singer_id`: required on create, non-empty integer
    /// - `bpm`: optional integer
    /// - `album`: optional scalar, at most 255 characters
    /// - `lyric`: optional scalar
    /// - `code`, `stroke`: optional, any JSON
    pub fn validate(payload: &Payload, mode: SaveMode) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let changes = SongChanges {
            title: required_text(payload, "title", mode, &mut errors),
            singer_id: required_integer(payload, "singer_id", mode, &mut errors),
            code: optional_json(payload, "code"),
            stroke: optional_json(payload, "stroke"),
            lyric: optional_text(payload, "lyric", None, &mut errors),
            bpm: optional_integer(payload, "bpm", &mut errors),
            album: optional_text(payload, "album", Some(MAX_TEXT_LENGTH), &mut errors),
            created: optional_timestamp(payload, "created", &mut errors),
            modified: optional_timestamp(payload, "modified", &mut errors),
        };

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }

    /// True if the payload carried nothing assignable
    pub fn is_empty(&self) -> bool {
        *self == SongChanges::default()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Text form of a scalar JSON value; `None` for arrays and objects
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integer from a JSON number or a decimal string with optional sign
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        }
        _ => None,
    }
}

fn check_length(text: &str, max: Option<usize>) -> Result<(), Rule> {
    match max {
        Some(max) if text.chars().count() > max => Err(Rule::MaxLength(max)),
        _ => Ok(()),
    }
}

fn required_text(
    payload: &Payload,
    field: &str,
    mode: SaveMode,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let Some(value) = payload.get(field) else {
        if mode == SaveMode::Create {
            errors.add(field, Rule::Required);
        }
        return None;
    };

    if is_empty_value(value) {
        errors.add(field, Rule::Empty);
        return None;
    }

    let Some(text) = scalar_text(value) else {
        errors.add(field, Rule::Scalar);
        return None;
    };

    // `false` renders as empty text
    if text.is_empty() {
        errors.add(field, Rule::Empty);
        return None;
    }

    match check_length(&text, Some(MAX_TEXT_LENGTH)) {
        Ok(()) => Some(text),
        Err(rule) => {
            errors.add(field, rule);
            None
        }
    }
}

fn optional_text(
    payload: &Payload,
    field: &str,
    max: Option<usize>,
    errors: &mut ValidationErrors,
) -> Option<Option<String>> {
    let value = payload.get(field)?;
    if value.is_null() {
        return Some(None);
    }

    let Some(text) = scalar_text(value) else {
        errors.add(field, Rule::Scalar);
        return None;
    };

    match check_length(&text, max) {
        Ok(()) => Some(Some(text)),
        Err(rule) => {
            errors.add(field, rule);
            None
        }
    }
}

fn required_integer(
    payload: &Payload,
    field: &str,
    mode: SaveMode,
    errors: &mut ValidationErrors,
) -> Option<i64> {
    let Some(value) = payload.get(field) else {
        if mode == SaveMode::Create {
            errors.add(field, Rule::Required);
        }
        return None;
    };

    if is_empty_value(value) {
        errors.add(field, Rule::Empty);
        return None;
    }

    let parsed = integer_value(value);
    if parsed.is_none() {
        errors.add(field, Rule::Integer);
    }
    parsed
}

fn optional_integer(
    payload: &Payload,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<Option<i64>> {
    let value = payload.get(field)?;
    if is_empty_value(value) {
        return Some(None);
    }

    match integer_value(value) {
        Some(n) => Some(Some(n)),
        None => {
            errors.add(field, Rule::Integer);
            None
        }
    }
}

fn optional_json(payload: &Payload, field: &str) -> Option<Option<Value>> {
    let value = payload.get(field)?;
    if is_empty_value(value) {
        Some(None)
    } else {
        Some(Some(value.clone()))
    }
}

fn optional_timestamp(
    payload: &Payload,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<DateTime<Utc>> {
    let value = payload.get(field)?;
    if is_empty_value(value) {
        return None;
    }

    let parsed = value.as_str().and_then(time::parse_client);
    if parsed.is_none() {
        errors.add(field, Rule::DateTime);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("test payload must be an object, got {}", other),
        }
    }

    // =========================================================================
    // Singer
    // =========================================================================

    #[test]
    fn test_singer_name_required_on_create() {
        let errors = SingerChanges::validate(&payload(json!({})), SaveMode::Create).unwrap_err();
        assert!(errors.has("name", Rule::Required));
    }

    #[test]
    fn test_singer_name_optional_on_update() {
        let changes = SingerChanges::validate(&payload(json!({})), SaveMode::Update).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_singer_empty_name_rejected() {
        for empty in [json!(""), Value::Null] {
            let errors =
                SingerChanges::validate(&payload(json!({ "name": empty })), SaveMode::Create)
                    .unwrap_err();
            assert!(errors.has("name", Rule::Empty));
        }

        let errors = SingerChanges::validate(&payload(json!({ "name": "" })), SaveMode::Update)
            .unwrap_err();
        assert!(errors.has("name", Rule::Empty));
    }

    #[test]
    fn test_false_is_not_a_name() {
        for mode in [SaveMode::Create, SaveMode::Update] {
            let errors = SingerChanges::validate(&payload(json!({ "name": false })), mode)
                .unwrap_err();
            assert!(errors.has("name", Rule::Empty));
        }

        let changes =
            SingerChanges::validate(&payload(json!({ "name": true })), SaveMode::Create).unwrap();
        assert_eq!(changes.name.as_deref(), Some("1"));
    }

    #[test]
    fn test_singer_name_length_counts_characters() {
        let at_limit = "é".repeat(MAX_TEXT_LENGTH);
        let changes =
            SingerChanges::validate(&payload(json!({ "name": at_limit })), SaveMode::Create)
                .unwrap();
        assert_eq!(changes.name.unwrap().chars().count(), MAX_TEXT_LENGTH);

        let too_long = "a".repeat(MAX_TEXT_LENGTH + 1);
        let errors =
            SingerChanges::validate(&payload(json!({ "name": too_long })), SaveMode::Create)
                .unwrap_err();
        assert!(errors.has("name", Rule::MaxLength(MAX_TEXT_LENGTH)));
    }

    #[test]
    fn test_singer_name_must_be_scalar() {
        let errors =
            SingerChanges::validate(&payload(json!({ "name": ["a", "b"] })), SaveMode::Create)
                .unwrap_err();
        assert!(errors.has("name", Rule::Scalar));
    }

    #[test]
    fn test_singer_unlisted_fields_dropped() {
        let changes = SingerChanges::validate(
            &payload(json!({ "id": 99, "name": "Test", "songs": [] })),
            SaveMode::Create,
        )
        .unwrap();
        assert_eq!(
            changes,
            SingerChanges {
                name: Some("Test".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_singer_timestamps_must_parse() {
        let errors = SingerChanges::validate(
            &payload(json!({ "name": "Test", "created": "last tuesday" })),
            SaveMode::Create,
        )
        .unwrap_err();
        assert!(errors.has("created", Rule::DateTime));

        let changes = SingerChanges::validate(
            &payload(json!({ "name": "Test", "modified": "2025-12-12 10:46:08" })),
            SaveMode::Create,
        )
        .unwrap();
        assert!(changes.modified.is_some());
    }

    // =========================================================================
    // Song
    // =========================================================================

    #[test]
    fn test_song_required_fields_on_create() {
        let errors = SongChanges::validate(&payload(json!({})), SaveMode::Create).unwrap_err();
        assert!(errors.has("title", Rule::Required));
        assert!(errors.has("singer_id", Rule::Required));
        assert_eq!(errors.fields().count(), 2);
    }

    #[test]
    fn test_song_title_false_rejected() {
        let errors = SongChanges::validate(
            &payload(json!({ "title": false, "singer_id": 1 })),
            SaveMode::Create,
        )
        .unwrap_err();
        assert!(errors.has("title", Rule::Empty));
        assert_eq!(errors.fields().count(), 1);
    }

    #[test]
    fn test_song_minimal_valid_payload() {
        let changes = SongChanges::validate(
            &payload(json!({ "title": "Song", "singer_id": 1 })),
            SaveMode::Create,
        )
        .unwrap();
        assert_eq!(changes.title.as_deref(), Some("Song"));
        assert_eq!(changes.singer_id, Some(1));
        assert_eq!(changes.bpm, None);
        assert_eq!(changes.code, None);
    }

    #[test]
    fn test_song_singer_id_accepts_numeric_strings() {
        let changes = SongChanges::validate(
            &payload(json!({ "title": "Song", "singer_id": "12" })),
            SaveMode::Create,
        )
        .unwrap();
        assert_eq!(changes.singer_id, Some(12));
    }

    #[test]
    fn test_song_singer_id_rejects_non_integers() {
        for bad in [json!("abc"), json!(1.5), json!("1.0"), json!([1])] {
            let errors = SongChanges::validate(
                &payload(json!({ "title": "Song", "singer_id": bad })),
                SaveMode::Create,
            )
            .unwrap_err();
            assert!(errors.has("singer_id", Rule::Integer), "accepted {:?}", bad);
        }

        let errors = SongChanges::validate(
            &payload(json!({ "title": "Song", "singer_id": "" })),
            SaveMode::Create,
        )
        .unwrap_err();
        assert!(errors.has("singer_id", Rule::Empty));
    }

    #[test]
    fn test_song_bpm_optional_integer() {
        let changes = SongChanges::validate(
            &payload(json!({ "title": "Song", "singer_id": 1, "bpm": "-120" })),
            SaveMode::Create,
        )
        .unwrap();
        assert_eq!(changes.bpm, Some(Some(-120)));

        let changes = SongChanges::validate(&payload(json!({ "bpm": "" })), SaveMode::Update)
            .unwrap();
        assert_eq!(changes.bpm, Some(None));

        let errors = SongChanges::validate(&payload(json!({ "bpm": "fast" })), SaveMode::Update)
            .unwrap_err();
        assert!(errors.has("bpm", Rule::Integer));
    }

    #[test]
    fn test_song_album_length_limit() {
        let errors = SongChanges::validate(
            &payload(json!({ "album": "x".repeat(MAX_TEXT_LENGTH + 1) })),
            SaveMode::Update,
        )
        .unwrap_err();
        assert!(errors.has("album", Rule::MaxLength(MAX_TEXT_LENGTH)));
        assert!(!errors.has_field("title"));
    }

    #[test]
    fn test_song_lyric_has_no_length_limit() {
        let lyric = "la ".repeat(10_000);
        let changes =
            SongChanges::validate(&payload(json!({ "lyric": lyric.clone() })), SaveMode::Update)
                .unwrap();
        assert_eq!(changes.lyric, Some(Some(lyric)));
    }

    #[test]
    fn test_song_code_and_stroke_are_opaque() {
        let code = json!([{ "chord": "Am", "beat": 1 }, { "chord": "F", "beat": 3 }]);
        let changes = SongChanges::validate(
            &payload(json!({ "code": code.clone(), "stroke": "" })),
            SaveMode::Update,
        )
        .unwrap();
        assert_eq!(changes.code, Some(Some(code)));
        assert_eq!(changes.stroke, Some(None));
    }

    #[test]
    fn test_song_id_and_association_are_not_assigned() {
        let changes = SongChanges::validate(
            &payload(json!({ "id": 42, "singer": { "name": "Other" }, "bogus": true })),
            SaveMode::Update,
        )
        .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_errors_display_lists_every_failure() {
        let errors = SongChanges::validate(&payload(json!({ "title": "" })), SaveMode::Create)
            .unwrap_err();
        let text = errors.to_string();
        assert!(text.contains("title: This field cannot be left empty"));
        assert!(text.contains("singer_id: This field is required"));
    }

    #[test]
    fn test_errors_serialize_as_nested_map() {
        let errors = ValidationErrors::single("singer_id", Rule::ExistsIn);
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({ "singer_id": { "_existsIn": "This value does not exist" } })
        );
    }
}
