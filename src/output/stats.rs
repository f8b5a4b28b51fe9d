//! Statistics from an output directory
//!
//! Reads the checkpoint and the raw sink without touching the network, for
//! the `--stats` command.

use crate::model::LotSource;
use crate::storage::{CheckpointStore, RawSink, StorageResult, CHECKPOINT_FILE};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Auctions with a checkpoint entry or raw records
    pub auctions_tracked: usize,

    /// Auctions whose listing was read to its end
    pub auctions_exhausted: usize,

    /// Auctions whose JSON endpoint answered 401/403
    pub auctions_requiring_login: usize,

    /// Page units committed
    pub pages_completed: usize,

    /// Lines in the raw sink, duplicates included
    pub raw_records: usize,

    /// Distinct `(auction_id, lot_id)` pairs
    pub unique_lots: usize,

    /// Distinct lots per producing strategy
    pub lots_by_source: BTreeMap<LotSource, usize>,

    pub last_updated: Option<DateTime<Utc>>,
}

/// Loads statistics from an output directory
///
/// # Arguments
///
/// * `output_dir` - The crawl output directory
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - The checkpoint or raw sink could not be read
pub fn load_statistics(output_dir: &Path) -> StorageResult<CrawlStatistics> {
    let state = CheckpointStore::load(&output_dir.join(CHECKPOINT_FILE))?;
    let sink = RawSink::new(output_dir.join("raw"));
    let records = sink.read_all_lots()?;

    let mut latest: BTreeMap<(&str, &str), LotSource> = BTreeMap::new();
    for record in &records {
        latest.insert(record.key(), record.source);
    }

    let mut lots_by_source = BTreeMap::new();
    for source in latest.values() {
        *lots_by_source.entry(*source).or_insert(0) += 1;
    }

    let mut auctions: HashSet<String> = state.auctions.keys().cloned().collect();
    auctions.extend(state.completed_units.iter().map(|u| u.auction_id.clone()));
    auctions.extend(sink.auction_ids()?);

    Ok(CrawlStatistics {
        auctions_tracked: auctions.len(),
        auctions_exhausted: state.auctions.values().filter(|p| p.exhausted).count(),
        auctions_requiring_login: state.auctions.values().filter(|p| p.requires_login).count(),
        pages_completed: state.completed_units.len(),
        raw_records: records.len(),
        unique_lots: latest.len(),
        lots_by_source,
        last_updated: state.last_updated,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Auctions:");
    println!("  Tracked: {}", stats.auctions_tracked);
    println!("  Read to the end: {}", stats.auctions_exhausted);
    println!("  Requiring login: {}", stats.auctions_requiring_login);
    println!();

    println!("Progress:");
    println!("  Pages committed: {}", stats.pages_completed);
    match stats.last_updated {
        Some(at) => println!("  Last checkpoint: {}", at.to_rfc3339()),
        None => println!("  Last checkpoint: never"),
    }
    println!();

    println!("Lots:");
    println!("  Raw records: {}", stats.raw_records);
    println!("  Unique lots: {}", stats.unique_lots);
    for (source, count) in &stats.lots_by_source {
        let percentage = if stats.unique_lots > 0 {
            (*count as f64 / stats.unique_lots as f64) * 100.0
        } else {
            0.0
        };
        println!("  From {}: {} ({:.1}%)", source, count, percentage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LotRecord;
    use crate::state::PageUnit;
    use std::collections::BTreeMap as Fields;
    use tempfile::TempDir;

    fn record(auction_id: &str, lot_id: &str, source: LotSource) -> LotRecord {
        LotRecord::new(auction_id, lot_id, source, 0, Fields::new())
    }

    #[test]
    fn test_empty_output_dir() {
        let dir = TempDir::new().unwrap();
        let stats = load_statistics(dir.path()).unwrap();

        assert_eq!(stats.auctions_tracked, 0);
        assert_eq!(stats.raw_records, 0);
        assert!(stats.last_updated.is_none());
    }

    #[test]
    fn test_counts_from_checkpoint_and_sink() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store
            .commit(
                &PageUnit::new("1", 0),
                &[record("1", "a", LotSource::Json), record("1", "b", LotSource::Json)],
            )
            .unwrap();
        store
            .commit(&PageUnit::new("1", 0), &[record("1", "a", LotSource::Json)])
            .unwrap();
        store
            .commit(&PageUnit::new("2", 0), &[record("2", "a", LotSource::Html)])
            .unwrap();
        store.mark_exhausted("1").unwrap();
        store.mark_requires_login("2").unwrap();

        let stats = load_statistics(dir.path()).unwrap();
        assert_eq!(stats.auctions_tracked, 2);
        assert_eq!(stats.auctions_exhausted, 1);
        assert_eq!(stats.auctions_requiring_login, 1);
        assert_eq!(stats.pages_completed, 2);
        assert_eq!(stats.raw_records, 4);
        assert_eq!(stats.unique_lots, 3);
        assert_eq!(stats.lots_by_source[&LotSource::Json], 2);
        assert_eq!(stats.lots_by_source[&LotSource::Html], 1);
        assert!(stats.last_updated.is_some());
    }
}
