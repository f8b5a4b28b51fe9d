use crate::model::{AuctionMetadata, DiscoveredAuction, LotRecord, LotSource};
use crate::storage::{write_json_atomic, CheckpointStore, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Consolidated auction list file name
pub const AUCTIONS_FILE: &str = "auctions.json";

/// Consolidated lot list file name
pub const CONSOLIDATED_LOTS_FILE: &str = "lots.json";

/// What this run learned about one auction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionRun {
    pub auction: DiscoveredAuction,
    /// Why the auction stopped early, if it did
    pub failure: Option<String>,
}

/// One entry of `auctions.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: String,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub discovered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: AuctionMetadata,
    #[serde(default)]
    pub strategy: Option<LotSource>,
    #[serde(default)]
    pub requires_login: bool,
    /// The listing was not read to its natural end
    #[serde(default)]
    pub incomplete: bool,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub pages_completed: usize,
    #[serde(default)]
    pub lot_count: usize,
}

/// Totals of a consolidation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Consolidation {
    pub auctions: usize,
    pub lots: usize,
    /// Raw records superseded by a later record with the same key
    pub duplicates_dropped: usize,
}

/// Assembles `auctions.json` and `lots.json` from the raw sink
///
/// Lots are deduplicated by `(auction_id, lot_id)`; the record read last
/// wins. Auctions known only from earlier runs keep the details of the
/// previous `auctions.json` when one exists.
///
/// # Arguments
///
/// * `output_dir` - Directory receiving both documents
/// * `store` - Checkpoint store of the run (progress and raw sink)
/// * `runs` - Auctions handled by this run, in discovery order
pub fn consolidate(
    output_dir: &Path,
    store: &CheckpointStore,
    runs: &[AuctionRun],
) -> StorageResult<Consolidation> {
    let raw = store.sink().read_all_lots()?;
    let raw_count = raw.len();

    let mut lots: BTreeMap<(String, String), LotRecord> = BTreeMap::new();
    for record in raw {
        lots.insert((record.auction_id.clone(), record.lot_id.clone()), record);
    }

    let mut lot_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (auction_id, _) in lots.keys() {
        *lot_counts.entry(auction_id.as_str()).or_default() += 1;
    }

    let mut summaries: BTreeMap<String, AuctionSummary> = load_previous(output_dir)
        .into_iter()
        .map(|s| (s.auction_id.clone(), s))
        .collect();

    for run in runs {
        let reference = &run.auction.reference;
        // details read by an earlier run survive a run that did not render the page
        let mut metadata = summaries
            .get(&reference.auction_id)
            .map(|previous| previous.metadata.clone())
            .unwrap_or_default();
        metadata.extend(run.auction.metadata.clone());

        summaries.insert(
            reference.auction_id.clone(),
            AuctionSummary {
                auction_id: reference.auction_id.clone(),
                detail_url: Some(reference.detail_url.clone()),
                discovered_at: Some(reference.discovered_at),
                metadata,
                strategy: None,
                requires_login: false,
                incomplete: false,
                failure: run.failure.clone(),
                pages_completed: 0,
                lot_count: 0,
            },
        );
    }

    for auction_id in store.sink().auction_ids()? {
        summaries
            .entry(auction_id.clone())
            .or_insert_with(|| AuctionSummary {
                auction_id,
                detail_url: None,
                discovered_at: None,
                metadata: AuctionMetadata::new(),
                strategy: None,
                requires_login: false,
                incomplete: false,
                failure: None,
                pages_completed: 0,
                lot_count: 0,
            });
    }

    for summary in summaries.values_mut() {
        let progress = store.progress(&summary.auction_id);
        summary.strategy = progress.and_then(|p| p.strategy);
        summary.requires_login = progress.is_some_and(|p| p.requires_login);
        summary.incomplete = !store.is_exhausted(&summary.auction_id);
        summary.pages_completed = store.state().pages_completed(&summary.auction_id);
        summary.lot_count = lot_counts
            .get(summary.auction_id.as_str())
            .copied()
            .unwrap_or(0);
    }

    let auctions: Vec<AuctionSummary> = summaries.into_values().collect();
    let lots: Vec<LotRecord> = lots.into_values().collect();

    write_json_atomic(&output_dir.join(AUCTIONS_FILE), &auctions)?;
    write_json_atomic(&output_dir.join(CONSOLIDATED_LOTS_FILE), &lots)?;

    let consolidation = Consolidation {
        auctions: auctions.len(),
        lots: lots.len(),
        duplicates_dropped: raw_count - lots.len(),
    };

    tracing::info!(
        "Consolidated {} auction(s) and {} lot(s) ({} superseded record(s) dropped)",
        consolidation.auctions,
        consolidation.lots,
        consolidation.duplicates_dropped
    );

    Ok(consolidation)
}

/// Reads the previous `auctions.json`; an unreadable file is ignored
fn load_previous(output_dir: &Path) -> Vec<AuctionSummary> {
    let path = output_dir.join(AUCTIONS_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
        Vec::new()
    })
}
