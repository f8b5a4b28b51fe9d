//! Pagination state definitions for a single auction
//!
//! `Start -> Fetching(n) -> {Fetching(n + 1) | Done | Failed}`. A cancelled
//! crawl leaves the auction `Stopped` at the page it did not finish.

use std::fmt;

/// Why pagination of an auction ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// The site reported no further pages
    Exhausted,
    /// The configured (or dry-run) page limit was reached
    PageLimit,
}

/// Represents where an auction's pagination currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    /// Strategy selected, no page requested yet
    Start,

    /// The given page index is being fetched or is next to fetch
    Fetching(u32),

    // ===== Terminal States =====
    /// Pagination finished
    Done(DoneReason),

    /// Retries for the given page were exhausted; earlier pages stay committed
    Failed { page_index: u32 },

    /// Shutdown was requested before the given page was committed
    Stopped { page_index: u32 },
}

impl PaginationState {
    /// Leaves `Start`, honouring a page limit
    pub fn begin(self, limit: Option<u32>) -> Self {
        match self {
            Self::Start if limit == Some(0) => Self::Done(DoneReason::PageLimit),
            Self::Start => Self::Fetching(0),
            other => other,
        }
    }

    /// Applies the transition rule after a successful page
    ///
    /// Advances only when the page reported a successor and the successor is
    /// still below the limit; otherwise pagination is done.
    pub fn advance(self, has_next_page: bool, limit: Option<u32>) -> Self {
        match self {
            Self::Fetching(page_index) => {
                let next = page_index + 1;
                if !has_next_page {
                    Self::Done(DoneReason::Exhausted)
                } else if limit.map_or(false, |limit| next >= limit) {
                    Self::Done(DoneReason::PageLimit)
                } else {
                    Self::Fetching(next)
                }
            }
            other => other,
        }
    }

    /// Moves past a page that was already committed by an earlier run
    pub fn skip(self, limit: Option<u32>) -> Self {
        self.advance(true, limit)
    }

    pub fn fail(self) -> Self {
        match self {
            Self::Fetching(page_index) => Self::Failed { page_index },
            other => other,
        }
    }

    pub fn stop(self) -> Self {
        match self {
            Self::Fetching(page_index) => Self::Stopped { page_index },
            Self::Start => Self::Stopped { page_index: 0 },
            other => other,
        }
    }

    /// Returns true once no further page will be fetched
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Start | Self::Fetching(_))
    }

    /// Returns true if the auction's listing was read to its natural end
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Done(DoneReason::Exhausted))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn current_page(&self) -> Option<u32> {
        match self {
            Self::Fetching(page_index) => Some(*page_index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching(_) => "fetching",
            Self::Done(DoneReason::Exhausted) => "done",
            Self::Done(DoneReason::PageLimit) => "page_limit",
            Self::Failed { .. } => "failed",
            Self::Stopped { .. } => "stopped",
        }
    }
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching(page_index) => write!(f, "fetching({})", page_index),
            Self::Failed { page_index } => write!(f, "failed({})", page_index),
            Self::Stopped { page_index } => write!(f, "stopped({})", page_index),
            other => f.write_str(other.as_str()),
        }
    }
}
