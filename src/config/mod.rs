//! Configuration module for lot-harvest
//!
//! This module handles loading, merging, and validating the crawl configuration.
//! The TOML file is optional; command-line overrides are applied on top and the
//! merged value is validated once before it reaches the orchestrator.
//!
//! # Example
//!
//! ```no_run
//! use lot_harvest::config::{resolve_config, ConfigOverrides};
//! use std::path::Path;
//!
//! let config = resolve_config(Some(Path::new("harvest.toml")), ConfigOverrides::default()).unwrap();
//! println!("Rate limit: {} req/s", config.crawler.rate_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, RetryConfig, UserAgentConfig, DEFAULT_BASE_URL,
};

// Re-export parser functions
pub use parser::{load_config, resolve_config, ConfigOverrides};
pub use validation::{validate, MAX_RATE_LIMIT};
