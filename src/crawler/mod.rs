//! Crawler module for polite fetching and per-auction crawling
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - The page renderer seam
//! - Per-auction strategy selection
//! - Pagination with checkpointed commits
//! - Overall crawl coordination and cancellation

mod coordinator;
mod fetcher;
mod pagination;
mod renderer;
mod selection;
mod shutdown;

pub use coordinator::{AuctionReport, Coordinator, CrawlReport};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use pagination::{page_limit, PaginationDriver, PaginationOutcome, DRY_RUN_PAGE_LIMIT};
pub use renderer::{HttpRenderer, RenderError, RenderedPage, Renderer};
pub use selection::{rank_candidates, select_strategy, Selection};
pub use shutdown::Shutdown;

use crate::config::Config;
use std::sync::Arc;

/// Runs a complete crawl with the bundled HTTP renderer
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the checkpoint in the output directory
/// 2. Load robots.txt for the site
/// 3. Discover auctions from the landing page
/// 4. Harvest every auction not already read to its end
/// 5. Write the consolidated outputs
///
/// # Arguments
///
/// * `config` - The validated crawl configuration
/// * `shutdown` - Signal that ends the crawl early
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed (possibly interrupted)
/// * `Err(HarvestError)` - Crawl failed
pub async fn crawl(config: Config, shutdown: Shutdown) -> crate::Result<CrawlReport> {
    let renderer = Arc::new(HttpRenderer::new(build_http_client(&config)?));
    let mut coordinator = Coordinator::new(config, renderer, shutdown)?;
    coordinator.run().await
}
