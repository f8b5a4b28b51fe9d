use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Best-effort descriptive fields of an auction (`number`, `city`, `status`, ...)
pub type AuctionMetadata = BTreeMap<String, String>;

/// An auction found during discovery
///
/// Immutable once created; identity is `auction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRef {
    pub auction_id: String,
    pub detail_url: String,
    pub discovered_at: DateTime<Utc>,
}

/// Discovery output: the reference plus whatever the listing card said about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAuction {
    pub reference: AuctionRef,
    pub metadata: AuctionMetadata,
}

impl AuctionRef {
    pub fn new(auction_id: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            auction_id: auction_id.into(),
            detail_url: detail_url.into(),
            discovered_at: Utc::now(),
        }
    }
}

impl DiscoveredAuction {
    pub fn auction_id(&self) -> &str {
        &self.reference.auction_id
    }

    /// Merges metadata learned later without overwriting what the card already gave
    pub fn merge_metadata(&mut self, extra: AuctionMetadata) {
        for (key, value) in extra {
            self.metadata.entry(key).or_insert(value);
        }
    }
}
