//! Extraction strategies
//!
//! A strategy turns one [`PageUnit`] into lot records plus a decision about
//! whether another page follows. Both variants are stateless; which one an
//! auction uses is decided by the crawler, not here.

pub mod fields;
mod html;
mod json;

pub use html::{page_url as html_listing_url, parse_lot_page, HtmlExtractor};
pub use json::{parse_listing, JsonExtractor};

use crate::crawler::{FetchError, Fetcher};
use crate::model::{LotRecord, LotSource};
use crate::state::PageUnit;
use thiserror::Error;
use url::Url;

/// Records read from one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<LotRecord>,
    pub has_next_page: bool,
    /// Link to the following page, when the page advertised one
    pub next_url: Option<Url>,
}

impl PageResult {
    /// A page that produced nothing and ends the listing
    pub fn empty() -> Self {
        Self::default()
    }
}

/// What a strategy needs to read a page
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub fetcher: &'a Fetcher,
    pub detail_url: &'a Url,
    pub next_url: Option<&'a Url>,
}

/// Why a page could not be read
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("authorization required (HTTP {status})")]
    AuthorizationBoundary { status: u16 },

    #[error("permanent failure: {reason}")]
    Permanent { reason: String },

    #[error("unexpected response shape: {reason}")]
    Structural { reason: String },

    #[error("retries exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl From<FetchError> for ExtractError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::AuthorizationBoundary { status, .. } => Self::AuthorizationBoundary { status },
            FetchError::Exhausted { attempts, .. } => Self::Exhausted { attempts },
            other @ (FetchError::Permanent { .. } | FetchError::RobotsDenied { .. }) => {
                Self::Permanent {
                    reason: other.to_string(),
                }
            }
        }
    }
}

/// The two interchangeable lot readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Json(JsonExtractor),
    Html(HtmlExtractor),
}

impl Strategy {
    pub fn source(&self) -> LotSource {
        match self {
            Self::Json(_) => LotSource::Json,
            Self::Html(_) => LotSource::Html,
        }
    }

    /// Reads one page of lots
    ///
    /// # Arguments
    ///
    /// * `unit` - The auction and page to read
    /// * `context` - Fetcher and the auction's URLs
    ///
    /// # Returns
    ///
    /// * `Ok(PageResult)` - The page's records and whether another page follows
    /// * `Err(ExtractError)` - The page could not be read
    pub async fn fetch_page(
        &self,
        unit: &PageUnit,
        context: &PageContext<'_>,
    ) -> Result<PageResult, ExtractError> {
        match self {
            Self::Json(extractor) => extractor.fetch_page(unit, context).await,
            Self::Html(extractor) => extractor.fetch_page(unit, context).await,
        }
    }
}
