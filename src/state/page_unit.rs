use serde::{Deserialize, Serialize};
use std::fmt;

/// One page of lots within one auction
///
/// Completion is binary and recorded by the checkpoint store only after the
/// page's records are durably in the raw sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageUnit {
    pub auction_id: String,
    pub page_index: u32,
}

impl PageUnit {
    pub fn new(auction_id: impl Into<String>, page_index: u32) -> Self {
        Self {
            auction_id: auction_id.into(),
            page_index,
        }
    }

    /// The unit for the following page of the same auction
    pub fn next(&self) -> Self {
        Self {
            auction_id: self.auction_id.clone(),
            page_index: self.page_index + 1,
        }
    }
}

impl fmt::Display for PageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.auction_id, self.page_index)
    }
}
