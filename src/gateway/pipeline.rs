//! Per-group poll pipeline: fetch → diff → classify → persist → commit →
//! answer mentions.

use super::{tracker::Poll, Gateway};
use crate::orders::{is_today, parse_order, SUMMARY_MARKER};
use chrono::{NaiveDate, NaiveDateTime};
use mealtally_core::{
    config::StartupMode,
    error::TallyError,
    message::{Message, OrderRecord},
};
use tracing::{debug, error, info, warn};

/// What a batch of new messages asks the gateway to do.
#[derive(Debug, Default)]
pub(super) struct Classified {
    pub orders: Vec<OrderRecord>,
    pub mentions: Vec<Message>,
}

impl Gateway {
    /// Poll one group and apply everything new since its baseline.
    pub(super) async fn poll_group(
        &mut self,
        group: &str,
        now: NaiveDateTime,
    ) -> Result<(), TallyError> {
        let today = now.date();
        self.state(group, today);

        let visible = self.session.fetch(group).await?;
        let poll = self.tracker.poll(group, &visible);

        let mentions = match &poll {
            Poll::Seed { baseline } => {
                info!(
                    "{group}: baseline seeded at {} ({} visible)",
                    baseline.as_ref().map(|b| b.0.as_str()).unwrap_or("-"),
                    visible.len()
                );
                if self.scheduler.startup_mode == StartupMode::Reprocess {
                    let batch = self.classify(&visible, now);
                    self.persist(group, today, &batch.orders)?;
                    // History is ingested, but old questions stay unanswered.
                    for msg in &batch.mentions {
                        if let Some(id) = &msg.id {
                            self.state(group, today).mark_mention(id);
                        }
                    }
                }
                Vec::new()
            }
            Poll::Delta { messages, .. } => {
                if messages.is_empty() {
                    debug!("{group}: no new messages");
                } else {
                    debug!("{group}: {} new messages", messages.len());
                }
                let batch = self.classify(messages, now);
                self.persist(group, today, &batch.orders)?;
                batch.mentions
            }
        };

        self.tracker.commit(group, poll.baseline().cloned());

        for msg in &mentions {
            self.answer_mention(group, msg, now).await;
        }
        Ok(())
    }

    /// Split messages into today's orders and mentions of the bot.
    ///
    /// The bot's own messages are ignored entirely; summary-tagged messages
    /// never become orders.
    pub(super) fn classify(&self, messages: &[Message], now: NaiveDateTime) -> Classified {
        let today = now.date();
        let mut out = Classified::default();
        for msg in messages {
            if msg.sender == self.bot.self_sender {
                continue;
            }
            if self.mentions.is_mentioned(&msg.content) {
                out.mentions.push(msg.clone());
            }
            if msg.content.contains(SUMMARY_MARKER) {
                continue;
            }
            if !is_today(&msg.timestamp, today) {
                debug!("skipping message from another day: {}", msg.preview());
                continue;
            }
            if let Some(order) = parse_order(&msg.content) {
                let stamp = if msg.timestamp.trim().is_empty() {
                    now.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    msg.timestamp.clone()
                };
                out.orders.push(order.into_record(&msg.sender, &stamp));
            }
        }
        out
    }

    /// Merge `orders` into today's partition and the in-memory day set.
    ///
    /// Orders already held in memory were persisted on an earlier tick and
    /// are not merged again.
    pub(super) fn persist(
        &mut self,
        group: &str,
        today: NaiveDate,
        orders: &[OrderRecord],
    ) -> Result<(), TallyError> {
        let orders = self.state(group, today).unseen(orders);
        if orders.is_empty() {
            return Ok(());
        }
        let report = self.ledger.merge_day(group, today, &orders)?;
        if report.is_degraded() {
            warn!(
                "{group}: ledger degraded for {today}; partition rebuilt from {} new orders",
                report.added
            );
        }
        self.state(group, today).remember(&orders);
        Ok(())
    }

    /// Reply `@sender <summary>` to a mention, at most once per message.
    async fn answer_mention(&mut self, group: &str, msg: &Message, now: NaiveDateTime) {
        let today = now.date();
        let Some(id) = &msg.id else {
            debug!("{group}: ignoring unidentified mention from {}", msg.sender);
            return;
        };
        if !self.state(group, today).mark_mention(id) {
            return;
        }

        let records = match self.ledger.read_day(group, today) {
            Ok(Some(rows)) => rows,
            Ok(None) => self.state(group, today).records_for(today).to_vec(),
            Err(e) => {
                warn!("{group}: ledger unreadable for mention reply ({e}); using memory");
                self.state(group, today).records_for(today).to_vec()
            }
        };
        let summary = self.engine.summarize(&records, today, group);
        let reply = format!("@{} {}", msg.sender, summary.text);
        match self.session.send(group, &reply).await {
            Ok(()) => info!("{group}: answered mention from {}", msg.sender),
            Err(e) => error!("{group}: mention reply to {} failed: {e}", msg.sender),
        }
    }
}
