//! Review input types.
//!
//! `ReviewRecord` is the loosely typed wire form: fields are kept as raw JSON
//! values so one bad record cannot fail deserialization of a whole batch.
//! `Review` is the validated form the detectors work on.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::InputError;

/// A validated review. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: Option<String>,
    pub text: String,
    pub author_id: Option<String>,
    pub posted_at: DateTime<Utc>,
}

impl Review {
    pub fn new(id: impl Into<String>, text: impl Into<String>, posted_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            author_id: None,
            posted_at,
        }
    }
}

/// Wire shape `{id?, text, date, author?}` as supplied by callers and by the
/// review source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
}

impl ReviewRecord {
    /// Convenience constructor for well-formed records (tests, fixtures).
    pub fn new(id: &str, text: &str, date: &str) -> Self {
        Self {
            id: Some(Value::String(id.to_string())),
            text: Some(Value::String(text.to_string())),
            date: Some(Value::String(date.to_string())),
            author: None,
        }
    }

    /// Best-effort id for failure reports, even when the record is otherwise broken.
    pub fn display_id(&self) -> Option<String> {
        self.id.as_ref().and_then(scalar_to_string)
    }
}

impl TryFrom<&ReviewRecord> for Review {
    type Error = InputError;

    fn try_from(rec: &ReviewRecord) -> Result<Self, Self::Error> {
        let id = match &rec.id {
            None | Some(Value::Null) => None,
            Some(v) => Some(scalar_to_string(v).ok_or(InputError::InvalidField {
                field: "id",
                expected: "a string or integer",
            })?),
        };

        let text = match &rec.text {
            None | Some(Value::Null) => return Err(InputError::MissingField("text")),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(InputError::InvalidField {
                    field: "text",
                    expected: "a string",
                })
            }
        };

        let posted_at = match &rec.date {
            None | Some(Value::Null) => return Err(InputError::MissingField("date")),
            Some(v) => parse_posted_at(v)?,
        };

        let author_id = match &rec.author {
            None | Some(Value::Null) => None,
            Some(v) => Some(scalar_to_string(v).ok_or(InputError::InvalidField {
                field: "author",
                expected: "a string",
            })?),
        };

        Ok(Review {
            id,
            text,
            author_id,
            posted_at,
        })
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339, or integer UNIX seconds.
pub fn parse_posted_at(v: &Value) -> Result<DateTime<Utc>, InputError> {
    match v {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| InputError::MalformedDate(n.to_string())),
        other => Err(InputError::MalformedDate(other.to_string())),
    }
}

fn parse_date_str(raw: &str) -> Result<DateTime<Utc>, InputError> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = d.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(InputError::MalformedDate(raw.to_string()))
}

/// Reviewer history applied uniformly to every review of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerHistory {
    #[serde(default)]
    pub activity_frequency: u32,
    #[serde(default)]
    pub reviewed_products: Vec<String>,
}

impl ReviewerHistory {
    pub fn new<I, S>(activity_frequency: u32, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            activity_frequency,
            reviewed_products: products.into_iter().map(Into::into).collect(),
        }
    }

    pub fn distinct_products(&self) -> usize {
        self.reviewed_products
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Short anonymized fingerprint of review text for logs. Raw text is never logged.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> ReviewRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_all_date_forms() {
        let day = Review::try_from(&rec(json!({"text": "x", "date": "2024-03-01"}))).unwrap();
        assert_eq!(day.posted_at.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let rfc = Review::try_from(&rec(json!({"text": "x", "date": "2024-03-01T10:30:00+02:00"})))
            .unwrap();
        assert_eq!(rfc.posted_at.to_rfc3339(), "2024-03-01T08:30:00+00:00");

        let unix = Review::try_from(&rec(json!({"text": "x", "date": 1_700_000_000}))).unwrap();
        assert_eq!(unix.posted_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn numeric_id_is_accepted() {
        let r =
            Review::try_from(&rec(json!({"id": 42, "text": "x", "date": "2024-03-01"}))).unwrap();
        assert_eq!(r.id.as_deref(), Some("42"));
    }

    #[test]
    fn malformed_records_fail_with_input_error() {
        let no_text = Review::try_from(&rec(json!({"id": "a", "date": "2024-03-01"})));
        assert_eq!(no_text, Err(InputError::MissingField("text")));

        let bad_text = Review::try_from(&rec(json!({"id": "a", "text": 7, "date": "2024-03-01"})));
        assert!(matches!(bad_text, Err(InputError::InvalidField { field: "text", .. })));

        let bad_date =
            Review::try_from(&rec(json!({"id": "a", "text": "x", "date": "01/03/2024"})));
        assert_eq!(bad_date, Err(InputError::MalformedDate("01/03/2024".into())));

        let obj_id =
            Review::try_from(&rec(json!({"id": {"k": 1}, "text": "x", "date": "2024-03-01"})));
        assert!(matches!(obj_id, Err(InputError::InvalidField { field: "id", .. })));
    }

    #[test]
    fn distinct_products_ignores_repeats() {
        let h = ReviewerHistory::new(1, ["p1", "p1", "p2"]);
        assert_eq!(h.distinct_products(), 2);
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("hello");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("hello"));
        assert_ne!(a, anon_hash("hello!"));
    }
}
