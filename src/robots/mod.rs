//! Robots.txt handling module
//!
//! The permission file is fetched once per crawl from the site origin. Any
//! failure to obtain it (network error, non-2xx, unreadable body) means the
//! crawl proceeds as if everything were allowed.

mod parser;

pub use parser::ParsedRobots;

use crate::politeness::Politeness;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Robots rules bound to the crawler's product token
#[derive(Debug, Clone)]
pub struct RobotsGate {
    robots: ParsedRobots,
    agent: String,
}

impl RobotsGate {
    pub fn new(robots: ParsedRobots, agent: impl Into<String>) -> Self {
        Self {
            robots,
            agent: agent.into(),
        }
    }

    pub fn allow_all(agent: impl Into<String>) -> Self {
        Self::new(ParsedRobots::allow_all(), agent)
    }

    /// Checks if a URL may be requested
    pub fn permits(&self, url: &Url) -> bool {
        self.robots.is_allowed(url.as_str(), &self.agent)
    }

    /// Declared crawl delay for this agent, if any
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.robots
            .crawl_delay(&self.agent)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Fetches and parses robots.txt for the origin of `base_url`
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `politeness` - Gate every request passes through
/// * `base_url` - Any URL on the target site
///
/// # Returns
///
/// The parsed rules, or allow-all when the file is unavailable
pub async fn fetch_robots(client: &Client, politeness: &Politeness, base_url: &Url) -> ParsedRobots {
    let robots_url = match base_url.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot derive robots.txt URL from {}: {}", base_url, e);
            return ParsedRobots::allow_all();
        }
    };

    politeness.acquire().await;

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("robots.txt unavailable at {} ({}), allowing all", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::info!(
            "robots.txt returned HTTP {} at {}, allowing all",
            response.status().as_u16(),
            robots_url
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Loaded robots.txt ({} bytes)", body.len());
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::warn!("Failed to read robots.txt body ({}), allowing all", e);
            ParsedRobots::allow_all()
        }
    }
}
