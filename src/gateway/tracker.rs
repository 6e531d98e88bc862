//! Per-group "new since last poll" tracking.

use mealtally_core::message::{Message, MessageId};
use std::collections::HashMap;

/// Lifecycle of a group's baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing committed yet; the next poll only seeds.
    AwaitingBaseline,
    Polling,
}

/// Result of diffing one fetched message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// First poll: adopt `baseline`, emit nothing.
    Seed { baseline: Option<MessageId> },
    /// Messages newer than the committed baseline, oldest first.
    Delta {
        messages: Vec<Message>,
        baseline: Option<MessageId>,
    },
}

impl Poll {
    /// Baseline to commit once the poll's effects are persisted.
    pub fn baseline(&self) -> Option<&MessageId> {
        match self {
            Self::Seed { baseline } | Self::Delta { baseline, .. } => baseline.as_ref(),
        }
    }
}

/// Computes per-group deltas against the last committed message id.
///
/// `poll` is pure; the baseline only moves on `commit`, so a poll whose
/// records failed to persist is diffed again on the next tick.
#[derive(Debug, Default)]
pub struct MessageDiffTracker {
    /// group → last committed id (`None` inside = committed, but nothing identified yet).
    baselines: HashMap<String, Option<MessageId>>,
}

impl MessageDiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, group: &str) -> Phase {
        if self.baselines.contains_key(group) {
            Phase::Polling
        } else {
            Phase::AwaitingBaseline
        }
    }

    pub fn baseline(&self, group: &str) -> Option<&MessageId> {
        self.baselines.get(group).and_then(Option::as_ref)
    }

    /// Diff `visible` (oldest → newest) against the group's baseline.
    pub fn poll(&self, group: &str, visible: &[Message]) -> Poll {
        let Some(current) = self.baselines.get(group) else {
            return Poll::Seed {
                baseline: newest_id(visible),
            };
        };

        let mut fresh = Vec::new();
        for msg in visible.iter().rev() {
            if current.is_some() && msg.id.as_ref() == current.as_ref() {
                break;
            }
            fresh.push(msg.clone());
        }
        fresh.reverse();

        Poll::Delta {
            messages: fresh,
            baseline: newest_id(visible).or_else(|| current.clone()),
        }
    }

    /// Record `baseline` as processed for `group`, entering `Polling`.
    pub fn commit(&mut self, group: &str, baseline: Option<MessageId>) {
        let entry = self.baselines.entry(group.to_string()).or_default();
        if baseline.is_some() {
            *entry = baseline;
        }
    }
}

/// Id of the newest message that has one.
fn newest_id(visible: &[Message]) -> Option<MessageId> {
    visible.iter().rev().find_map(|m| m.id.clone())
}
