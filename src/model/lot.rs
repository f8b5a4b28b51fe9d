use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which extraction strategy produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotSource {
    Json,
    Html,
}

/// A scalar field value of a lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Null,
}

/// One lot as read from one page of an auction
///
/// `lot_id` is unique within `auction_id` only. Records are never mutated
/// after creation; a later record with the same id supersedes an earlier one
/// at consolidation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRecord {
    pub auction_id: String,
    pub lot_id: String,
    pub raw_fields: BTreeMap<String, FieldValue>,
    pub source: LotSource,
    pub page_index: u32,
    pub fetched_at: DateTime<Utc>,
}

impl LotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for LotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(Self::Text).unwrap_or(Self::Null)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map(Self::Number).unwrap_or(Self::Null)
    }
}

impl LotRecord {
    pub fn new(
        auction_id: impl Into<String>,
        lot_id: impl Into<String>,
        source: LotSource,
        page_index: u32,
        raw_fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            lot_id: lot_id.into(),
            raw_fields,
            source,
            page_index,
            fetched_at: Utc::now(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.raw_fields.get(name)
    }

    /// Identity used for deduplication across pages and runs
    pub fn key(&self) -> (&str, &str) {
        (&self.auction_id, &self.lot_id)
    }
}
