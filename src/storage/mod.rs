//! Storage module for persisting crawl progress
//!
//! This module owns everything the crawl writes under the output directory
//! before consolidation:
//! - the raw sink (`raw/<auction_id>/lots.jsonl`, `raw/<auction_id>/api_endpoints.jsonl`)
//! - the checkpoint document (`.checkpoint/state.json`)
//!
//! Records are always appended to the raw sink before the checkpoint marks
//! their page done.

mod checkpoint;
mod error;
mod raw_sink;

pub use checkpoint::{
    write_json_atomic, AuctionProgress, CheckpointState, CheckpointStore, CHECKPOINT_FILE,
};
pub use error::{StorageError, StorageResult};
pub use raw_sink::{EndpointRecord, RawSink, ENDPOINTS_FILE, LOTS_FILE};
