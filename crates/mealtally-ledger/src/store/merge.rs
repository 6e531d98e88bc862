//! Batch merge into a day partition, with the lossy recovery path.

use super::{decode_partition, load_month, partition_name, write_month, LedgerStore, MonthFile};
use chrono::NaiveDate;
use mealtally_core::{error::TallyError, message::OrderRecord};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// How a merge treated the target partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The partition (and possibly the month store) did not exist.
    Created,
    /// New rows were appended to an existing partition.
    Appended,
    /// Every incoming row was already present; nothing was written.
    Unchanged,
    /// The existing partition or store was unreadable and was replaced
    /// by the incoming batch alone.
    Recovered,
}

/// Outcome of [`LedgerStore::merge_day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub duplicates: usize,
    pub mode: MergeMode,
}

impl MergeReport {
    pub fn is_degraded(&self) -> bool {
        self.mode == MergeMode::Recovered
    }
}

impl LedgerStore {
    /// Merge `batch` into the `date` partition of `group`'s month store.
    ///
    /// Rows whose `(sender, description)` already exists in the partition,
    /// or earlier in the batch, are dropped. The partition is rewritten
    /// wholesale; existing rows are never modified.
    pub fn merge_day(
        &self,
        group: &str,
        date: NaiveDate,
        batch: &[OrderRecord],
    ) -> Result<MergeReport, TallyError> {
        if batch.is_empty() {
            return Ok(MergeReport {
                added: 0,
                duplicates: 0,
                mode: MergeMode::Unchanged,
            });
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| TallyError::Ledger("ledger write lock poisoned".into()))?;

        let path = self.month_path(group, date);
        let day = partition_name(date);

        let (mut month, existing, mut mode) = match load_month(&path) {
            Ok(None) => (new_month(group), Vec::new(), MergeMode::Created),
            Ok(Some(month)) => match month.partitions.get(&day) {
                None => (month, Vec::new(), MergeMode::Created),
                Some(raw) => match decode_partition(raw, &path, date) {
                    Ok(rows) => (month, rows, MergeMode::Appended),
                    Err(e) => {
                        warn!("ledger degraded: {e}; overwriting partition with the new batch");
                        (month, Vec::new(), MergeMode::Recovered)
                    }
                },
            },
            Err(TallyError::LedgerCorrupt(reason)) => {
                warn!(
                    "ledger degraded: store unreadable ({reason}); starting a fresh store for {group}"
                );
                quarantine(&path);
                (new_month(group), Vec::new(), MergeMode::Recovered)
            }
            Err(e) => return Err(e),
        };

        let mut keys: HashSet<(String, String)> = existing
            .iter()
            .map(|r| (r.sender.clone(), r.description.clone()))
            .collect();
        let mut rows = existing;
        let mut added = 0;
        let mut duplicates = 0;
        for record in batch {
            if keys.insert((record.sender.clone(), record.description.clone())) {
                rows.push(record.clone());
                added += 1;
            } else {
                debug!(
                    "ledger: skipping duplicate order {} - {}",
                    record.sender, record.description
                );
                duplicates += 1;
            }
        }

        if added == 0 && mode == MergeMode::Appended {
            mode = MergeMode::Unchanged;
            debug!("ledger: {group} {day}: no new orders ({duplicates} duplicates)");
            return Ok(MergeReport {
                added,
                duplicates,
                mode,
            });
        }

        month.partitions.insert(day.clone(), serde_json::to_value(&rows)?);
        write_month(&path, &month)?;

        info!(
            "ledger: {group} {day}: +{added} orders ({duplicates} duplicates, {} total, {mode:?})",
            rows.len()
        );
        Ok(MergeReport {
            added,
            duplicates,
            mode,
        })
    }
}

fn new_month(group: &str) -> MonthFile {
    MonthFile {
        group: group.to_string(),
        ..Default::default()
    }
}

/// Move an unreadable store aside so recovery does not destroy it.
fn quarantine(path: &Path) {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let mut target = path.as_os_str().to_owned();
    target.push(format!(".corrupt-{stamp}"));
    match std::fs::rename(path, &target) {
        Ok(()) => warn!("ledger: moved unreadable store to {}", Path::new(&target).display()),
        Err(e) => warn!("ledger: failed to move unreadable store {}: {e}", path.display()),
    }
}
