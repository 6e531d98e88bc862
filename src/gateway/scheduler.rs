//! Daily summary window and scheduled dispatch.

use super::Gateway;
use chrono::{NaiveDateTime, Timelike};
use mealtally_core::{error::TallyError, message::OrderRecord};
use tracing::{info, warn};

/// Whether `now` falls in `[start, start + window]` minutes of the day.
pub fn in_summary_window(now: NaiveDateTime, start_minute: u32, window_minutes: u32) -> bool {
    let minute = now.hour() * 60 + now.minute();
    minute >= start_minute && minute <= start_minute + window_minutes
}

/// Summary text addressed to the group's configured person.
pub fn addressed(alias: &str, summary: &str) -> String {
    if alias.is_empty() {
        summary.to_string()
    } else {
        format!("@{alias} {summary}")
    }
}

impl Gateway {
    /// Send today's summary for `group` if the window is open and it has
    /// not gone out yet. The flag is only set after a successful send.
    pub(super) async fn maybe_send_scheduled(
        &mut self,
        group: &str,
        now: NaiveDateTime,
    ) -> Result<(), TallyError> {
        let today = now.date();
        if !in_summary_window(
            now,
            self.summary_start_minute,
            self.scheduler.summary_window_minutes,
        ) {
            return Ok(());
        }
        if self.state(group, today).summarized_on(today) {
            return Ok(());
        }

        let records = self.day_records(group, now);
        self.send_summary(group, &records, now).await?;

        if !records.is_empty() {
            let report = self.ledger.merge_day(group, today, &records)?;
            if report.is_degraded() {
                warn!("{group}: ledger degraded while persisting the summary set");
            }
        }
        self.state(group, today).last_summary_date = Some(today);
        info!("{group}: scheduled summary sent for {today}");
        Ok(())
    }

    /// Today's orders for scheduled and manual summaries: the ledger
    /// partition plus anything held in memory that it lacks. Memory alone
    /// when the ledger cannot be read.
    pub(super) fn day_records(&mut self, group: &str, now: NaiveDateTime) -> Vec<OrderRecord> {
        let today = now.date();
        let held = self.state(group, today).records_for(today).to_vec();
        let mut records = match self.ledger.read_day(group, today) {
            Ok(rows) => rows.unwrap_or_default(),
            Err(e) => {
                warn!("{group}: cannot read ledger for summary: {e}");
                return held;
            }
        };
        for record in held {
            if !records.iter().any(|r| r.key() == record.key()) {
                records.push(record);
            }
        }
        records
    }

    pub(super) async fn send_summary(
        &self,
        group: &str,
        records: &[OrderRecord],
        now: NaiveDateTime,
    ) -> Result<(), TallyError> {
        let alias = self.groups.get(group).map(String::as_str).unwrap_or_default();
        let summary = self.engine.summarize(records, now.date(), group);
        info!("{group}: summary {}", summary.mode.short());
        self.session.send(group, &addressed(alias, &summary.text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(h, m, 30)
            .unwrap()
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let start = 16 * 60;
        assert!(!in_summary_window(at(15, 59), start, 5));
        assert!(in_summary_window(at(16, 0), start, 5));
        assert!(in_summary_window(at(16, 5), start, 5));
        assert!(!in_summary_window(at(16, 6), start, 5));
    }

    #[test]
    fn test_zero_width_window() {
        assert!(in_summary_window(at(11, 30), 11 * 60 + 30, 0));
        assert!(!in_summary_window(at(11, 31), 11 * 60 + 30, 0));
    }

    #[test]
    fn test_addressed_text() {
        assert_eq!(addressed("布鲁布鲁", "汇总"), "@布鲁布鲁 汇总");
        assert_eq!(addressed("", "汇总"), "汇总");
    }
}
