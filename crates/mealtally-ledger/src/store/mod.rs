//! File-backed order ledger.
//!
//! Split into focused submodules:
//! - `merge` — key-deduplicating merge of a batch into a day partition
//!
//! On-disk layout: one JSON file per (group, month) named
//! `<month>月_<group>_订餐统计表.json`, holding a map of ISO date →
//! order rows.

mod merge;


pub use merge::{MergeMode, MergeReport};

use chrono::{Datelike, NaiveDate};
use mealtally_core::{
    config::LedgerConfig, error::TallyError, message::OrderRecord, sanitize, shellexpand,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Contents of one month store.
///
/// Partitions stay as raw JSON so one damaged day does not make the
/// whole month unreadable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct MonthFile {
    #[serde(default)]
    pub(crate) group: String,
    #[serde(default)]
    pub(crate) partitions: BTreeMap<String, serde_json::Value>,
}

/// Per-group, per-month ledger rooted at a directory.
pub struct LedgerStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles; reads do not take it.
    write_lock: Mutex<()>,
}

impl LedgerStore {
    /// Open (and create if needed) a ledger rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TallyError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            TallyError::Ledger(format!(
                "failed to create ledger dir {}: {e}",
                dir.display()
            ))
        })?;
        info!("Ledger initialized at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the ledger configured in `[ledger]`.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, TallyError> {
        Self::new(shellexpand(&config.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the month store holding `date` for `group`.
    pub fn month_path(&self, group: &str, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}月_{}_订餐统计表.json",
            date.month(),
            sanitize::file_component(group)
        ))
    }

    /// Read the rows of one day partition.
    ///
    /// `Ok(None)` when the month store or the partition does not exist;
    /// `Err(LedgerCorrupt)` when either exists but cannot be parsed.
    pub fn read_day(
        &self,
        group: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<OrderRecord>>, TallyError> {
        let path = self.month_path(group, date);
        let Some(month) = load_month(&path)? else {
            return Ok(None);
        };
        match month.partitions.get(&partition_name(date)) {
            Some(raw) => decode_partition(raw, &path, date).map(Some),
            None => Ok(None),
        }
    }

    /// Dates with a partition in the month store containing `date`.
    pub fn partition_dates(&self, group: &str, date: NaiveDate) -> Result<Vec<String>, TallyError> {
        let path = self.month_path(group, date);
        Ok(load_month(&path)?
            .map(|m| m.partitions.into_keys().collect())
            .unwrap_or_default())
    }
}

/// Partition key for a calendar date.
pub(crate) fn partition_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Load a month store. `Ok(None)` if the file does not exist.
pub(crate) fn load_month(path: &Path) -> Result<Option<MonthFile>, TallyError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(TallyError::Ledger(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| TallyError::LedgerCorrupt(format!("{}: {e}", path.display())))
}

pub(crate) fn decode_partition(
    raw: &serde_json::Value,
    path: &Path,
    date: NaiveDate,
) -> Result<Vec<OrderRecord>, TallyError> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        TallyError::LedgerCorrupt(format!(
            "{} partition {}: {e}",
            path.display(),
            partition_name(date)
        ))
    })
}

/// Replace a month store wholesale: write a sibling temp file, then rename.
pub(crate) fn write_month(path: &Path, month: &MonthFile) -> Result<(), TallyError> {
    let body = serde_json::to_string_pretty(month)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body)
        .map_err(|e| TallyError::Ledger(format!("failed to write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        TallyError::Ledger(format!(
            "failed to move {} → {}: {e}",
            tmp.display(),
            path.display()
        ))
    })
}
