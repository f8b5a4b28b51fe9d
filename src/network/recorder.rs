use crate::model::{NetworkObservation, ResponseMeta};
use crate::network::EndpointCandidate;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Audit log file name inside the output directory
pub const AUDIT_LOG_FILE: &str = "network.jsonl";

/// Append-only recorder of response metadata
///
/// Recording never fails from the caller's point of view: audit log write
/// errors are logged and dropped. Full observations only go to the audit
/// log; memory holds the endpoint candidates of each auction, deduplicated
/// as they arrive, until the auction is released.
#[derive(Debug)]
pub struct NetworkRecorder {
    audit_path: Option<PathBuf>,
    index: Mutex<CandidateIndex>,
}

#[derive(Debug, Default)]
struct CandidateIndex {
    observed: usize,
    by_auction: HashMap<String, Vec<EndpointCandidate>>,
}

impl NetworkRecorder {
    /// Creates a recorder that also appends every observation to `audit_path`
    pub fn new(audit_path: impl Into<PathBuf>) -> Self {
        Self {
            audit_path: Some(audit_path.into()),
            index: Mutex::default(),
        }
    }

    /// Creates a recorder without an audit log
    pub fn in_memory() -> Self {
        Self {
            audit_path: None,
            index: Mutex::default(),
        }
    }

    /// Records one response
    ///
    /// # Arguments
    ///
    /// * `meta` - Response metadata (never the body)
    /// * `auction_id` - The auction whose page produced the response, if known
    pub fn observe(&self, meta: ResponseMeta, auction_id: Option<&str>) {
        let observation = NetworkObservation::from_meta(meta, auction_id);

        if let Some(path) = &self.audit_path {
            if let Err(e) = append_line(path, &observation) {
                tracing::warn!("Failed to record observation of {}: {}", observation.url, e);
            }
        }

        tracing::debug!(
            "Observed {} {} -> {} ({})",
            observation.method,
            observation.url,
            observation.status_code,
            observation.content_type
        );

        let candidate = EndpointCandidate::from_observation(&observation);
        let mut index = self.lock();
        index.observed += 1;
        if let (Some(auction_id), Some(candidate)) = (observation.auction_id, candidate) {
            let candidates = index.by_auction.entry(auction_id).or_default();
            if !candidates
                .iter()
                .any(|c| c.url_template == candidate.url_template)
            {
                candidates.push(candidate);
            }
        }
    }

    /// JSON endpoints seen on the given auction's pages, one per URL template
    pub fn candidates_for(&self, auction_id: &str) -> Vec<EndpointCandidate> {
        self.lock()
            .by_auction
            .get(auction_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops what is held for an auction that has been processed
    pub fn release(&self, auction_id: &str) {
        self.lock().by_auction.remove(auction_id);
    }

    /// Number of responses observed so far
    pub fn len(&self) -> usize {
        self.lock().observed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CandidateIndex> {
        self.index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn append_line(path: &Path, observation: &NetworkObservation) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(observation)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
