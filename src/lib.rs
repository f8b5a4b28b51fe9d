//! lot-harvest: a polite, resumable auction-listing crawler
//!
//! This crate harvests auctions and their lots from a single listing site.
//! Lots are read from the site's own JSON endpoints when they can be observed
//! and fall back to HTML lot cards otherwise. Every outbound request passes
//! through one politeness controller, and progress is checkpointed per page so
//! an interrupted run resumes without refetching or duplicating records.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod extract;
pub mod model;
pub mod network;
pub mod output;
pub mod politeness;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for lot-harvest operations
///
/// Only discovery failures and checkpoint/raw-sink storage failures end a
/// crawl. Everything below the auction level is folded into per-auction state.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery failed for {url}: {reason}")]
    DiscoveryFailed { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for lot-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use model::{AuctionRef, FieldValue, LotRecord, LotSource};
pub use state::{PageUnit, PaginationState};
