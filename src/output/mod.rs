//! Output module for consolidated results and crawl statistics
//!
//! This module handles:
//! - Assembling `auctions.json` and `lots.json` from the raw sink at crawl end
//! - Reporting progress statistics from an output directory

mod consolidate;
pub mod stats;

pub use consolidate::{
    consolidate, AuctionRun, AuctionSummary, Consolidation, AUCTIONS_FILE, CONSOLIDATED_LOTS_FILE,
};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
