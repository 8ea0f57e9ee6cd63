//! Typed scalar values for whitelisted fields.

use std::{cmp::Ordering, fmt::Display};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The storage type of a whitelisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Bool,
    Timestamp,
    Uuid,
}

impl FieldKind {
    /// Parse a raw query-string value into a value of this kind.
    ///
    /// Timestamps accept RFC 3339 or a bare `YYYY-MM-DD` date, which is taken
    /// as midnight UTC.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, String> {
        let raw = raw.trim();
        match self {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("expected a boolean, got '{raw}'")),
            },
            FieldKind::Timestamp => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                    return Ok(FieldValue::Timestamp(dt.with_timezone(&Utc)));
                }
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| FieldValue::Timestamp(dt.and_utc()))
                    .ok_or_else(|| format!("expected an RFC 3339 timestamp or date, got '{raw}'"))
            }
            FieldKind::Uuid => Uuid::parse_str(raw)
                .map(FieldValue::Uuid)
                .map_err(|_| format!("expected a UUID, got '{raw}'")),
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Timestamp => write!(f, "timestamp"),
            FieldKind::Uuid => write!(f, "uuid"),
        }
    }
}

/// A single typed value, as bound into a query or carried in a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
            FieldValue::Uuid(_) => FieldKind::Uuid,
        }
    }

    /// Compare two values of the same kind. Values of different kinds are
    /// incomparable.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            (FieldValue::Uuid(a), FieldValue::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}
