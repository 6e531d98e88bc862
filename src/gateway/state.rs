use chrono::NaiveDate;
use mealtally_core::message::{MessageId, OrderRecord};
use std::collections::HashSet;

/// Mutable per-group bookkeeping owned by the gateway.
#[derive(Debug, Default)]
pub(super) struct GroupState {
    /// Date the scheduled summary last went out.
    pub last_summary_date: Option<NaiveDate>,
    /// Mentions already answered today.
    pub processed_mentions: HashSet<MessageId>,
    day: Option<NaiveDate>,
    /// Orders ingested today, in arrival order, deduplicated.
    records: Vec<OrderRecord>,
}

impl GroupState {
    /// Reset day-scoped state when the local date advances.
    pub fn roll_day(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            self.day = Some(today);
            self.records.clear();
            self.processed_mentions.clear();
        }
    }

    pub fn remember(&mut self, batch: &[OrderRecord]) {
        for record in batch {
            if !self.records.iter().any(|r| r.key() == record.key()) {
                self.records.push(record.clone());
            }
        }
    }

    /// Records in `batch` whose key is not held yet.
    pub fn unseen(&self, batch: &[OrderRecord]) -> Vec<OrderRecord> {
        batch
            .iter()
            .filter(|record| !self.records.iter().any(|r| r.key() == record.key()))
            .cloned()
            .collect()
    }

    /// In-memory records, only if they belong to `today`.
    pub fn records_for(&self, today: NaiveDate) -> &[OrderRecord] {
        if self.day == Some(today) {
            &self.records
        } else {
            &[]
        }
    }

    pub fn summarized_on(&self, today: NaiveDate) -> bool {
        self.last_summary_date == Some(today)
    }

    /// Returns `false` when `id` was already handled.
    pub fn mark_mention(&mut self, id: &MessageId) -> bool {
        self.processed_mentions.insert(id.clone())
    }
}
