//! Records produced and consumed by the crawl
//!
//! - `AuctionRef`: one auction found on the landing page
//! - `LotRecord`: one lot read from a page of an auction
//! - `NetworkObservation` / `ResponseMeta`: metadata about responses seen on the wire

mod auction;
mod lot;
mod observation;

pub use auction::{AuctionMetadata, AuctionRef, DiscoveredAuction};
pub use lot::{FieldValue, LotRecord, LotSource};
pub use observation::{NetworkObservation, ResponseMeta};
