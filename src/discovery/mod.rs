//! Auction discovery
//!
//! The landing page is rendered and its "details" links become the crawl's
//! auctions. When rendering fails or finds nothing, the same page is fetched
//! over plain HTTP and parsed again. No auctions at all ends the crawl.

mod parser;

pub use parser::{parse_auction_details, parse_auction_links};

use crate::crawler::{Fetcher, Renderer};
use crate::model::DiscoveredAuction;
use crate::{HarvestError, Result};
use url::Url;

/// Enumerates the auctions listed on `home_url`
///
/// # Arguments
///
/// * `fetcher` - Polite HTTP access (also gates the render)
/// * `renderer` - The crawl's page renderer
/// * `home_url` - Landing page listing the auctions
/// * `max_auctions` - Optional cap on the number of auctions returned
///
/// # Returns
///
/// * `Ok(Vec<DiscoveredAuction>)` - At least one auction, in page order
/// * `Err(HarvestError::DiscoveryFailed)` - Neither path found an auction
pub async fn discover(
    fetcher: &Fetcher,
    renderer: &dyn Renderer,
    home_url: &Url,
    max_auctions: Option<usize>,
) -> Result<Vec<DiscoveredAuction>> {
    let rendered = match fetcher.render(renderer, home_url, None).await {
        Ok(page) => {
            let auctions = parse_auction_links(&page.html, &page.final_url, max_auctions);
            if !auctions.is_empty() {
                tracing::info!("Discovered {} auction(s) on {}", auctions.len(), home_url);
                return Ok(auctions);
            }
            "rendered page has no auction links".to_string()
        }
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        "Discovery via render failed ({}); retrying {} over plain HTTP",
        rendered,
        home_url
    );

    let fetched = match fetcher.get(home_url, None).await {
        Ok(page) => {
            let auctions = parse_auction_links(&page.body, &page.final_url, max_auctions);
            if !auctions.is_empty() {
                tracing::info!(
                    "Discovered {} auction(s) on {} via plain HTTP",
                    auctions.len(),
                    home_url
                );
                return Ok(auctions);
            }
            "fetched page has no auction links".to_string()
        }
        Err(e) => e.to_string(),
    };

    Err(HarvestError::DiscoveryFailed {
        url: home_url.to_string(),
        reason: format!("{}; {}", rendered, fetched),
    })
}
