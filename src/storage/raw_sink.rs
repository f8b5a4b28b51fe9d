use crate::model::LotRecord;
use crate::network::EndpointCandidate;
use crate::storage::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Lot records of one auction, one JSON object per line
pub const LOTS_FILE: &str = "lots.jsonl";

/// Endpoint candidates recorded for one auction, one JSON object per line
pub const ENDPOINTS_FILE: &str = "api_endpoints.jsonl";

/// One line of `api_endpoints.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    #[serde(flatten)]
    pub candidate: EndpointCandidate,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only per-auction record files
#[derive(Debug, Clone)]
pub struct RawSink {
    root: PathBuf,
}

impl RawSink {
    /// Creates a sink rooted at `root` (usually `<output_dir>/raw`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn auction_dir(&self, auction_id: &str) -> StorageResult<PathBuf> {
        validate_component(auction_id)?;
        Ok(self.root.join(auction_id))
    }

    /// Durably appends lot records for an auction
    ///
    /// Returns only after the data has been flushed and synced to disk.
    pub fn append_lots(&self, auction_id: &str, records: &[LotRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.auction_dir(auction_id)?.join(LOTS_FILE);
        append_json_lines(&path, records)
    }

    /// Appends the endpoint candidates observed for an auction
    pub fn append_endpoints(
        &self,
        auction_id: &str,
        candidates: &[EndpointCandidate],
    ) -> StorageResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        let recorded_at = Utc::now();
        let entries: Vec<EndpointRecord> = candidates
            .iter()
            .map(|candidate| EndpointRecord {
                candidate: candidate.clone(),
                recorded_at,
            })
            .collect();

        let path = self.auction_dir(auction_id)?.join(ENDPOINTS_FILE);
        append_json_lines(&path, &entries)
    }

    /// Reads back every lot record of an auction
    ///
    /// Lines that do not parse (such as a final line cut short by a crash)
    /// are skipped with a warning.
    pub fn read_lots(&self, auction_id: &str) -> StorageResult<Vec<LotRecord>> {
        let path = self.auction_dir(auction_id)?.join(LOTS_FILE);
        read_json_lines(&path)
    }

    pub fn read_endpoints(&self, auction_id: &str) -> StorageResult<Vec<EndpointRecord>> {
        let path = self.auction_dir(auction_id)?.join(ENDPOINTS_FILE);
        read_json_lines(&path)
    }

    /// Auction ids that have a directory in the sink, sorted
    pub fn auction_ids(&self) -> StorageResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every lot record in the sink, grouped by auction in id order
    pub fn read_all_lots(&self) -> StorageResult<Vec<LotRecord>> {
        let mut all = Vec::new();
        for auction_id in self.auction_ids()? {
            all.extend(self.read_lots(&auction_id)?);
        }
        Ok(all)
    }
}

fn validate_component(auction_id: &str) -> StorageResult<()> {
    let invalid = auction_id.is_empty()
        || auction_id == "."
        || auction_id == ".."
        || auction_id.contains(|c: char| matches!(c, '/' | '\\' | '\0'));

    if invalid {
        Err(StorageError::InvalidAuctionId(auction_id.to_string()))
    } else {
        Ok(())
    }
}

fn append_json_lines<T: Serialize>(path: &Path, items: &[T]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let mut buffer = Vec::new();
    if ends_mid_line(&mut file)? {
        // a torn line from an interrupted append must not swallow the next record
        tracing::warn!("{} ends with a partial line; starting a new one", path.display());
        buffer.push(b'\n');
    }
    for item in items {
        serde_json::to_writer(&mut buffer, item)?;
        buffer.push(b'\n');
    }

    file.write_all(&buffer)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

/// True when the file is non-empty and its last byte is not a newline
fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn read_json_lines<T: for<'de> Deserialize<'de>>(path: &Path) -> StorageResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(
                "Skipping unreadable line {} of {}: {}",
                number + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(items)
}
