//! Order aggregation into a human-readable daily total.

use super::parse::listed_names;
use chrono::NaiveDate;
use mealtally_core::message::OrderRecord;
use std::collections::HashSet;

/// Reply used when there is nothing to summarize.
pub const EMPTY_SUMMARY: &str = "没有找到订餐信息";

/// Which counting convention produced a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    Empty,
    /// At least one headcount list: total attendees across all lists.
    Attendees { total: u64 },
    /// Portion orders only: distinct senders and summed portions.
    Portions { people: usize, portions: u64 },
}

impl SummaryMode {
    /// Compact form for status displays, e.g. `3人/5份`.
    pub fn short(&self) -> String {
        match self {
            Self::Empty => "0人/0份".to_string(),
            Self::Attendees { total } => format!("{total}人"),
            Self::Portions { people, portions } => format!("{people}人/{portions}份"),
        }
    }
}

/// A computed summary and its message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub mode: SummaryMode,
    pub text: String,
}

/// Aggregates order records into a daily summary.
#[derive(Debug, Clone)]
pub struct SummaryEngine {
    self_sender: String,
}

impl SummaryEngine {
    /// `self_sender` rows (the bot's own account) never count as people.
    pub fn new(self_sender: impl Into<String>) -> Self {
        Self {
            self_sender: self_sender.into(),
        }
    }

    pub fn aggregate(&self, records: &[OrderRecord]) -> SummaryMode {
        let records: Vec<&OrderRecord> = records
            .iter()
            .filter(|r| r.sender != self.self_sender)
            .collect();
        if records.is_empty() {
            return SummaryMode::Empty;
        }

        if records.iter().any(|r| r.is_headcount_list) {
            // Portion rows never mix into an attendee total.
            let total = records
                .iter()
                .filter(|r| r.is_headcount_list)
                .map(|r| u64::from(r.declared_count.max(listed_names(&r.description))))
                .sum();
            return SummaryMode::Attendees { total };
        }

        let people = records
            .iter()
            .map(|r| r.sender.as_str())
            .collect::<HashSet<_>>()
            .len();
        let portions = records.iter().map(|r| u64::from(r.declared_count)).sum();
        SummaryMode::Portions { people, portions }
    }

    /// Summarize `records` for `group` on `date`.
    pub fn summarize(&self, records: &[OrderRecord], date: NaiveDate, group: &str) -> Summary {
        let mode = self.aggregate(records);
        let date = date.format("%Y-%m-%d");
        let text = match mode {
            SummaryMode::Empty => EMPTY_SUMMARY.to_string(),
            SummaryMode::Attendees { total } => format!("{date}{group}订餐汇总：共{total}人"),
            SummaryMode::Portions { people, portions } => {
                format!("{date}{group}订餐汇总：共{people}人订餐，{portions}份")
            }
        };
        Summary { mode, text }
    }
}
