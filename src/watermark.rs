//! Persisted per-account watermarks
//!
//! One JSON file maps account labels to the instant below which all
//! messages are considered already classified. The file is read fully,
//! mutated per account, and rewritten as a whole through an atomic
//! temp-file-and-rename replace; a process-level mutex serializes
//! writers so concurrent watchers never corrupt each other's entries.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{Result, WatchError};

pub struct WatermarkStore {
    path: PathBuf,
    records: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
}

impl WatermarkStore {
    /// Load the record set from disk. A missing file is an empty store,
    /// not an error.
    pub fn load(path: PathBuf) -> Result<Self> {
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(WatchError::Persistence(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        info!(path = %path.display(), "Watermark store loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Current watermark for an account. `None` means the entire mailbox
    /// is still unclassified.
    pub fn get(&self, label: &str) -> Option<DateTime<Utc>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(label).copied().flatten()
    }

    /// Seed an account's watermark from configuration, only when the
    /// store has no entry for it yet.
    pub fn seed(&self, label: &str, seed: Option<DateTime<Utc>>) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if !records.contains_key(label) {
            records.insert(label.to_string(), seed);
        }
    }

    /// Advance an account's watermark to `instant` and persist the whole
    /// record set. The watermark never moves backward; a stale `instant`
    /// leaves the stored value untouched.
    ///
    /// On a write failure the in-memory value has already advanced, so
    /// progress survives for the rest of the process lifetime even while
    /// the on-disk record is stale.
    pub fn advance(&self, label: &str, instant: DateTime<Utc>) -> Result<()> {
        // Lock held from mutation through the file write so interleaved
        // advances from other watchers cannot persist out of order.
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let entry = records.entry(label.to_string()).or_insert(None);
        match *entry {
            Some(current) if current >= instant => {
                debug!(account = label, "Watermark unchanged (would move backward)");
                return Ok(());
            }
            _ => *entry = Some(instant),
        }

        debug!(account = label, watermark = %instant, "Watermark advanced");
        self.persist(&records)
    }

    fn persist(&self, records: &HashMap<String, Option<DateTime<Utc>>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WatchError::Persistence(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            WatchError::Persistence(format!("cannot write {}: {}", self.path.display(), e))
        })
    }
}
