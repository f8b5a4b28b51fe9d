//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageUnit`: one page of one auction, the resumable unit of work
//! - `PaginationState`: per-auction pagination state machine

mod page_unit;
mod pagination_state;

// Re-export main types
pub use page_unit::PageUnit;
pub use pagination_state::{DoneReason, PaginationState};
