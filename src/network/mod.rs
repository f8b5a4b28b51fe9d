//! Network observation
//!
//! Responses seen while rendering or fetching are recorded as metadata only.
//! The audit log is append-only; in-memory observations feed the per-auction
//! JSON endpoint candidates.

mod candidate;
mod recorder;

pub use candidate::EndpointCandidate;
pub use recorder::{NetworkRecorder, AUDIT_LOG_FILE};
