//! Page rendering seam
//!
//! A headless browser plugs in behind [`Renderer`]. It reports the page's
//! own response plus every sub-response it saw while rendering, which is how
//! the site's JSON endpoints get discovered. [`HttpRenderer`] is the bundled
//! stand-in: a plain GET with no script execution.

use crate::model::ResponseMeta;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Output of rendering one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub final_url: Url,
    pub status: u16,
    pub html: String,
    /// Metadata of every response seen while rendering (never bodies)
    pub responses: Vec<ResponseMeta>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{url} is disallowed by robots.txt")]
    RobotsDenied { url: String },

    #[error("render of {url} failed: {reason}")]
    Failed { url: String, reason: String },
}

/// A page renderer held for the whole crawl
///
/// The orchestrator gates each call with the politeness controller and calls
/// [`Renderer::shutdown`] exactly once when the crawl ends, on every path.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;

    /// Releases the engine's resources
    async fn shutdown(&self) {}
}

/// Renderer that performs a plain HTTP GET
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let failed = |reason: String| RenderError::Failed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let html = response.text().await.map_err(|e| failed(e.to_string()))?;

        Ok(RenderedPage {
            responses: vec![ResponseMeta::get(final_url.as_str(), status, content_type)],
            final_url,
            status,
            html,
        })
    }
}
