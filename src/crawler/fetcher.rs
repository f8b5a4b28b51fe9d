//! HTTP fetcher
//!
//! All plain HTTP traffic of the crawl goes through [`Fetcher::get`]:
//! - robots.txt is checked before anything is sent
//! - every attempt waits on the politeness controller
//! - responses are classified and transient failures retried with backoff
//! - JSON responses are handed to the network recorder

use super::renderer::{RenderError, RenderedPage, Renderer};
use crate::config::Config;
use crate::model::ResponseMeta;
use crate::network::NetworkRecorder;
use crate::politeness::{Outcome, Politeness, RetryDecision, RetrySequence};
use crate::robots::RobotsGate;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Terminal fetch failures (transient ones are retried inside the fetcher)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} is disallowed by robots.txt")]
    RobotsDenied { url: String },

    #[error("HTTP {status} from {url}: authorization required")]
    AuthorizationBoundary { url: String, status: u16 },

    #[error("{url}: {reason}")]
    Permanent { url: String, reason: String },

    #[error("{url}: gave up after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },
}

/// Result of a single attempt
enum Attempt {
    Fetched(FetchedPage),
    Unauthorized(u16),
    Rejected(String),
    Transient(String),
}

impl Attempt {
    fn outcome(&self) -> Outcome {
        match self {
            Self::Fetched(_) => Outcome::Success,
            Self::Transient(_) => Outcome::TransientFailure,
            Self::Unauthorized(_) | Self::Rejected(_) => Outcome::PermanentFailure,
        }
    }
}

/// Builds the crawl's HTTP client
///
/// # Arguments
///
/// * `config` - Crawl configuration (user agent and timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use lot_harvest::config::Config;
/// use lot_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(config.crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Polite, robots-aware HTTP access shared by every component
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    politeness: Arc<Politeness>,
    robots: RobotsGate,
    recorder: Arc<NetworkRecorder>,
}

impl Fetcher {
    pub fn new(
        client: Client,
        politeness: Arc<Politeness>,
        robots: RobotsGate,
        recorder: Arc<NetworkRecorder>,
    ) -> Self {
        Self {
            client,
            politeness,
            robots,
            recorder,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn politeness(&self) -> &Politeness {
        &self.politeness
    }

    pub fn recorder(&self) -> &NetworkRecorder {
        &self.recorder
    }

    pub fn robots(&self) -> &RobotsGate {
        &self.robots
    }

    /// Fetches a URL with retry on transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | HTTP 401/403 | Immediate → AuthorizationBoundary |
    /// | HTTP 429, 5xx | Backoff and retry |
    /// | Other 4xx | Immediate → Permanent |
    /// | Timeout, connection or body error | Backoff and retry |
    /// | Attempt budget spent | Exhausted |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `auction_id` - Auction the request belongs to, for observation attribution
    pub async fn get(&self, url: &Url, auction_id: Option<&str>) -> Result<FetchedPage, FetchError> {
        if !self.robots.permits(url) {
            tracing::warn!("Skipping {} (disallowed by robots.txt)", url);
            return Err(FetchError::RobotsDenied {
                url: url.to_string(),
            });
        }

        let mut retry = RetrySequence::new();
        loop {
            self.politeness.acquire().await;
            let attempt = self.attempt(url, auction_id).await;
            let decision = self
                .politeness
                .report_outcome(&mut retry, attempt.outcome())
                .await;

            match (attempt, decision) {
                (Attempt::Fetched(page), _) => return Ok(page),
                (Attempt::Unauthorized(status), _) => {
                    return Err(FetchError::AuthorizationBoundary {
                        url: url.to_string(),
                        status,
                    })
                }
                (Attempt::Rejected(reason), _) => {
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        reason,
                    })
                }
                (Attempt::Transient(reason), RetryDecision::Exhausted { attempts }) => {
                    tracing::warn!("Giving up on {}: {}", url, reason);
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts,
                    });
                }
                (Attempt::Transient(reason), _) => {
                    tracing::debug!("Retrying {} after transient failure: {}", url, reason);
                }
            }
        }
    }

    /// Renders a page through the politeness gate and records its responses
    ///
    /// Renders are not retried; a failed render is reported to the caller,
    /// which has its own fallback path.
    pub async fn render(
        &self,
        renderer: &dyn Renderer,
        url: &Url,
        auction_id: Option<&str>,
    ) -> Result<RenderedPage, RenderError> {
        if !self.robots.permits(url) {
            return Err(RenderError::RobotsDenied {
                url: url.to_string(),
            });
        }

        self.politeness.acquire().await;
        let page = renderer.render(url).await?;

        for response in &page.responses {
            self.recorder.observe(response.clone(), auction_id);
        }

        if !(200..300).contains(&page.status) {
            return Err(RenderError::Failed {
                url: url.to_string(),
                reason: format!("HTTP {}", page.status),
            });
        }

        Ok(page)
    }

    async fn attempt(&self, url: &Url, auction_id: Option<&str>) -> Attempt {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(describe_error(&e)),
        };

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let meta = ResponseMeta::get(final_url.as_str(), status.as_u16(), content_type.as_str());
        if meta.is_json() {
            self.recorder.observe(meta, auction_id);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Attempt::Unauthorized(status.as_u16());
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }

        if !status.is_success() {
            return Attempt::Rejected(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => Attempt::Fetched(FetchedPage {
                final_url,
                status: status.as_u16(),
                content_type,
                body,
            }),
            Err(e) => Attempt::Transient(describe_error(&e)),
        }
    }
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    }
}
