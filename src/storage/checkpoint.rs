use crate::model::{LotRecord, LotSource};
use crate::network::EndpointCandidate;
use crate::state::PageUnit;
use crate::storage::{RawSink, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Location of the checkpoint document relative to the output directory
pub const CHECKPOINT_FILE: &str = ".checkpoint/state.json";

/// Per-auction decisions that must survive a restart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionProgress {
    /// Strategy chosen for the auction; fixed once set to `html`
    #[serde(default)]
    pub strategy: Option<LotSource>,
    /// Endpoint the JSON strategy reads from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointCandidate>,
    #[serde(default)]
    pub requires_login: bool,
    /// Pagination reached the end of the listing
    #[serde(default)]
    pub exhausted: bool,
}

/// The persisted checkpoint document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub completed_units: BTreeSet<PageUnit>,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auctions: BTreeMap<String, AuctionProgress>,
}

/// Durable record of completed page units
///
/// A unit is marked done only after its records are in the raw sink, and
/// the document is replaced atomically on every change.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    sink: RawSink,
    state: CheckpointState,
}

impl CheckpointState {
    pub fn pages_completed(&self, auction_id: &str) -> usize {
        self.completed_units
            .iter()
            .filter(|unit| unit.auction_id == auction_id)
            .count()
    }
}

impl CheckpointStore {
    /// Opens the checkpoint for an output directory, loading any previous state
    ///
    /// # Arguments
    ///
    /// * `output_dir` - The crawl output directory
    ///
    /// # Returns
    ///
    /// * `Ok(CheckpointStore)` - Store with the previous run's state (or empty)
    /// * `Err(StorageError)` - The document exists but cannot be read or parsed
    pub fn open(output_dir: &Path) -> StorageResult<Self> {
        let path = output_dir.join(CHECKPOINT_FILE);
        let sink = RawSink::new(output_dir.join("raw"));
        let state = Self::load(&path)?;

        if !state.completed_units.is_empty() {
            tracing::info!(
                "Resuming from checkpoint: {} page(s) across {} auction(s) already done",
                state.completed_units.len(),
                state
                    .completed_units
                    .iter()
                    .map(|u| u.auction_id.as_str())
                    .collect::<BTreeSet<_>>()
                    .len()
            );
        }

        Ok(Self { path, sink, state })
    }

    /// Reads a checkpoint document; a missing file is an empty state
    pub fn load(path: &Path) -> StorageResult<CheckpointState> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CheckpointState::default())
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| StorageError::CorruptCheckpoint {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sink(&self) -> &RawSink {
        &self.sink
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn is_done(&self, unit: &PageUnit) -> bool {
        self.state.completed_units.contains(unit)
    }

    pub fn progress(&self, auction_id: &str) -> Option<&AuctionProgress> {
        self.state.auctions.get(auction_id)
    }

    /// True when a previous run read the auction's listing to its end
    pub fn is_exhausted(&self, auction_id: &str) -> bool {
        self.progress(auction_id).map_or(false, |p| p.exhausted)
    }

    /// Appends a unit's records to the raw sink, then marks the unit done
    ///
    /// If the sink write fails the unit stays not-done and the error is
    /// returned; a crash between the two steps leaves records that the next
    /// run appends again, which consolidation deduplicates.
    pub fn commit(&mut self, unit: &PageUnit, records: &[LotRecord]) -> StorageResult<()> {
        self.sink.append_lots(&unit.auction_id, records)?;

        self.state.completed_units.insert(unit.clone());
        self.persist()?;

        tracing::debug!("Committed {} ({} records)", unit, records.len());
        Ok(())
    }

    /// Records the strategy chosen for an auction
    pub fn record_strategy(
        &mut self,
        auction_id: &str,
        strategy: LotSource,
        endpoint: Option<EndpointCandidate>,
    ) -> StorageResult<()> {
        let progress = self.state.auctions.entry(auction_id.to_string()).or_default();
        if progress.strategy == Some(strategy) && progress.endpoint == endpoint {
            return Ok(());
        }
        progress.strategy = Some(strategy);
        progress.endpoint = endpoint;
        self.persist()
    }

    pub fn mark_requires_login(&mut self, auction_id: &str) -> StorageResult<()> {
        let progress = self.state.auctions.entry(auction_id.to_string()).or_default();
        if progress.requires_login {
            return Ok(());
        }
        progress.requires_login = true;
        self.persist()
    }

    pub fn mark_exhausted(&mut self, auction_id: &str) -> StorageResult<()> {
        let progress = self.state.auctions.entry(auction_id.to_string()).or_default();
        if progress.exhausted {
            return Ok(());
        }
        progress.exhausted = true;
        self.persist()
    }

    /// Switches an auction to HTML and forgets its committed pages
    ///
    /// Page indexes of the JSON endpoint do not line up with HTML listing
    /// pages, so the HTML pass starts again from page 0. Records already in
    /// the raw sink stay there. One document write covers the whole change.
    pub fn restart_with_html(&mut self, auction_id: &str, requires_login: bool) -> StorageResult<()> {
        self.state
            .completed_units
            .retain(|unit| unit.auction_id != auction_id);

        let progress = self.state.auctions.entry(auction_id.to_string()).or_default();
        progress.strategy = Some(LotSource::Html);
        progress.endpoint = None;
        progress.exhausted = false;
        progress.requires_login |= requires_login;
        self.persist()
    }

    /// Replaces the checkpoint document atomically
    fn persist(&mut self) -> StorageResult<()> {
        self.state.last_updated = Some(Utc::now());
        write_json_atomic(&self.path, &self.state)
    }
}

/// Writes `value` as pretty JSON to `path` through a synced temp file
///
/// Readers see either the previous document or the new one, never a mix.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(&json)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}
