use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default landing page of the auction site
pub const DEFAULT_BASE_URL: &str = "https://leilao.detran.mg.gov.br/";

/// Main configuration structure for lot-harvest
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the documented defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Landing page that lists the auctions
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Request ceiling in requests per second
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Optional cap on the number of auctions crawled
    #[serde(rename = "max-auctions", default)]
    pub max_auctions: Option<usize>,

    /// Optional cap on pages crawled per auction
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Caps every auction at [`DRY_RUN_PAGE_LIMIT`](crate::crawler::DRY_RUN_PAGE_LIMIT) pages
    #[serde(rename = "dry-run", default)]
    pub dry_run: bool,

    /// Prefer a headless rendering engine when one is available
    #[serde(default)]
    pub headless: bool,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Backoff policy for transient failures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts per request before the fetch is reported as exhausted
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL or note describing the crawler
    #[serde(rename = "contact-url", default = "default_contact_url")]
    pub contact_url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory receiving the raw sink, checkpoint, logs and consolidated outputs
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl CrawlerConfig {
    /// Minimum spacing between two requests implied by `rate_limit`
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_limit)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl UserAgentConfig {
    /// Formats the identifying user agent string
    ///
    /// Format: `name/version (+contact; respects robots.txt)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; respects robots.txt)",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            rate_limit: default_rate_limit(),
            max_auctions: None,
            max_pages: None,
            dry_run: false,
            headless: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: default_contact_url(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_rate_limit() -> f64 {
    0.5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    750
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_crawler_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contact_url() -> String {
    "ethical".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
