use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a single HTTP response, as handed to the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub content_type: String,
}

/// Audit-trail entry for one observed response
///
/// Append-only; the crawl never reads these back from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkObservation {
    pub url: String,
    pub content_type: String,
    pub status_code: u16,
    pub method: String,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<String>,
}

impl ResponseMeta {
    pub fn get(url: impl Into<String>, status_code: u16, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            status_code,
            content_type: content_type.into(),
        }
    }

    /// True when the declared media type is JSON (`application/json`, `application/vnd.x+json`, ...)
    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }
}

impl NetworkObservation {
    pub fn from_meta(meta: ResponseMeta, auction_id: Option<&str>) -> Self {
        Self {
            url: meta.url,
            content_type: meta.content_type,
            status_code: meta.status_code,
            method: meta.method,
            observed_at: Utc::now(),
            auction_id: auction_id.map(str::to_string),
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }
}

pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}
