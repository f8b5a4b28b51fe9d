//! Field names and value parsing shared by both extractors

use crate::model::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const DESCRIPTION: &str = "description";
pub const BRAND_MODEL: &str = "brand_model";
pub const YEAR: &str = "year";
pub const SITUATION: &str = "situation";
pub const START_BID: &str = "start_bid";
pub const ENDS_AT: &str = "ends_at";
pub const LOT_URL: &str = "lot_url";
pub const IMAGE_URL: &str = "image_url";
pub const IMAGE_COUNT: &str = "image_count";
pub const REQUIRES_LOGIN: &str = "requires_login";
pub const RAW_TEXT: &str = "raw_text";

/// Longest description kept on a record, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 180;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));

static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern should compile"));

static BR_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})/(\d{2})/(\d{4})(?:\s*(?:às|as|-)?\s*(\d{1,2})[:h](\d{2})(?::(\d{2}))?)?")
        .expect("date pattern should compile")
});

/// Collapses runs of whitespace and trims
pub fn norm_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// First 19xx/20xx token in the text
pub fn parse_year(text: &str) -> Option<i64> {
    YEAR_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses a Brazilian money string such as `R$ 1.234,56`
pub fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Finds a `dd/mm/yyyy [hh:mm[:ss]]` timestamp in free text
///
/// Returns it as a naive ISO-8601 string; the site shows local times without
/// an offset.
pub fn parse_datetime_loose(text: &str) -> Option<String> {
    let caps = BR_DATETIME.captures(text)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(number(3)?).ok()?,
        number(2)?,
        number(1)?,
    )?;
    let datetime = date.and_hms_opt(number(4).unwrap_or(0), number(5).unwrap_or(0), number(6).unwrap_or(0))?;
    Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// First non-null value under any of `keys`
///
/// Exact key matches win; a case-insensitive pass follows.
pub fn get_first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
        .or_else(|| {
            keys.iter().find_map(|key| {
                object
                    .iter()
                    .find(|(name, value)| name.eq_ignore_ascii_case(key) && !value.is_null())
                    .map(|(_, value)| value)
            })
        })
}

/// Renders a scalar as trimmed text; objects, arrays and blank strings give `None`
pub fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numbers pass through; strings are parsed as money
pub fn money_value(value: &Value) -> FieldValue {
    match value {
        Value::Number(n) => n.as_f64().into(),
        Value::String(s) => parse_money(s).into(),
        _ => FieldValue::Null,
    }
}

/// Normalises a timestamp field to ISO-8601 text
///
/// Numbers are epoch seconds (or milliseconds when large). Strings are
/// tried as RFC 3339, as a naive ISO timestamp, then as `dd/mm/yyyy`; text
/// that matches none of these is kept as is.
pub fn timestamp_value(value: &Value) -> FieldValue {
    match value {
        Value::Number(n) => {
            let Some(raw) = n.as_f64() else {
                return FieldValue::Null;
            };
            let seconds = if raw > 10_000_000_000.0 { raw / 1000.0 } else { raw };
            DateTime::<Utc>::from_timestamp(seconds as i64, 0)
                .map(|dt| dt.to_rfc3339())
                .into()
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return FieldValue::Null;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return FieldValue::text(dt.to_rfc3339());
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return FieldValue::text(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
                }
            }
            FieldValue::text(parse_datetime_loose(s).unwrap_or_else(|| s.to_string()))
        }
        _ => FieldValue::Null,
    }
}
