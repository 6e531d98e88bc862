//! Gateway: the polling loop that connects the chat stream, the order
//! pipeline, and the ledger.
//!
//! One sequential loop walks every monitored group per tick. A group's
//! failure is logged and isolated; a tick where every group failed backs
//! off before the next one.

mod dispatch;
mod pipeline;
mod scheduler;
mod state;
mod tracker;

#[cfg(test)]
mod tests;

use dispatch::StreamSession;
use tracker::{MessageDiffTracker, Phase};

use crate::orders::{MentionDetector, SummaryEngine};
use chrono::NaiveDate;
use mealtally_core::{
    config::{BotConfig, Config, SchedulerConfig},
    error::TallyError,
    traits::{Clock, MessageStream},
};
use mealtally_ledger::LedgerStore;
use state::GroupState;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Requests serviced by the loop between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Stop,
    /// Send summaries now: one group, or all when `None`.
    SummarizeNow(Option<String>),
}

/// Cloneable handle for stopping or poking a running gateway.
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<Control>,
    stop: Arc<AtomicBool>,
}

impl GatewayHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wakes the loop if it is sleeping; a full queue means it is busy anyway.
        let _ = self.tx.try_send(Control::Stop);
    }

    pub async fn request_summary(&self, group: Option<String>) -> Result<(), TallyError> {
        self.tx
            .send(Control::SummarizeNow(group))
            .await
            .map_err(|_| TallyError::Send("gateway is not running".into()))
    }
}

/// Owns the stream session, ledger, clock, and every per-group state.
pub struct Gateway {
    pub(super) session: Arc<StreamSession>,
    pub(super) ledger: Arc<LedgerStore>,
    pub(super) clock: Arc<dyn Clock>,
    /// Group name → alias addressed by scheduled summaries.
    pub(super) groups: BTreeMap<String, String>,
    pub(super) bot: BotConfig,
    pub(super) scheduler: SchedulerConfig,
    pub(super) summary_start_minute: u32,
    pub(super) mentions: MentionDetector,
    pub(super) engine: SummaryEngine,
    pub(super) tracker: MessageDiffTracker,
    states: HashMap<String, GroupState>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
    stop: Arc<AtomicBool>,
    ticks: u64,
}

impl Gateway {
    pub fn new(
        config: &Config,
        stream: Box<dyn MessageStream>,
        ledger: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TallyError> {
        config.validate()?;
        let summary_start_minute = config.scheduler.summary_start_minute()?;
        let session = StreamSession::new(
            stream,
            Duration::from_secs(config.scheduler.io_timeout_secs),
            Duration::from_millis(config.scheduler.send_retry_delay_ms),
        );
        let (control_tx, control_rx) = mpsc::channel(16);
        Ok(Self {
            session: Arc::new(session),
            ledger,
            clock,
            groups: config.groups.clone(),
            bot: config.bot.clone(),
            scheduler: config.scheduler.clone(),
            summary_start_minute,
            mentions: MentionDetector::new(config.bot.mention_names()),
            engine: SummaryEngine::new(config.bot.self_sender.clone()),
            tracker: MessageDiffTracker::new(),
            states: HashMap::new(),
            control_tx,
            control_rx,
            stop: Arc::new(AtomicBool::new(false)),
            ticks: 0,
        })
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            tx: self.control_tx.clone(),
            stop: self.stop.clone(),
        }
    }

    /// Run until stopped.
    pub async fn run(mut self) {
        info!(
            "mealtally gateway running | stream: {} | groups: {} | summary at {} (+{}m)",
            self.session.name().await,
            self.groups.keys().cloned().collect::<Vec<_>>().join(", "),
            self.scheduler.summary_time,
            self.scheduler.summary_window_minutes,
        );

        let poll = Duration::from_secs(self.scheduler.poll_interval_secs);
        let backoff = Duration::from_secs(self.scheduler.error_backoff_secs);

        loop {
            while let Ok(control) = self.control_rx.try_recv() {
                self.handle_control(control).await;
            }
            if self.stopped() {
                break;
            }

            self.ticks += 1;
            if self.ticks % self.scheduler.heartbeat_every_ticks == 0 {
                info!("heartbeat: tick {} | {}", self.ticks, self.status_line());
            }

            let pause = match self.tick().await {
                Ok(()) => poll,
                Err(e) => {
                    warn!("every group failed this tick ({e}); backing off {}s", backoff.as_secs());
                    backoff
                }
            };

            let control = tokio::select! {
                _ = tokio::time::sleep(pause) => None,
                control = self.control_rx.recv() => control,
            };
            if let Some(control) = control {
                self.handle_control(control).await;
            }
        }
        info!("gateway stopped after {} ticks", self.ticks);
    }

    /// One pass over every group. Errors only when all groups failed.
    pub async fn tick(&mut self) -> Result<(), TallyError> {
        let now = self.clock.now();
        let groups: Vec<String> = self.groups.keys().cloned().collect();
        let mut failed = 0;
        let mut last_error = None;

        for group in &groups {
            if self.stopped() {
                return Ok(());
            }
            let outcome = match self.poll_group(group, now).await {
                Ok(()) => self.maybe_send_scheduled(group, now).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                error!("{group}: {e}");
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failed == groups.len() => Err(e),
            _ => Ok(()),
        }
    }

    /// Send summaries immediately without touching the daily flag.
    ///
    /// Returns how many summaries went out.
    pub async fn summarize_now(&mut self, group: Option<&str>) -> Result<usize, TallyError> {
        let targets: Vec<String> = match group {
            Some(g) if self.groups.contains_key(g) => vec![g.to_string()],
            Some(g) => {
                return Err(TallyError::Config(format!("unknown group '{g}'")));
            }
            None => self.groups.keys().cloned().collect(),
        };

        let now = self.clock.now();
        let mut sent = 0;
        for group in &targets {
            let records = self.day_records(group, now);
            match self.send_summary(group, &records, now).await {
                Ok(()) => sent += 1,
                Err(e) => error!("{group}: manual summary failed: {e}"),
            }
        }
        Ok(sent)
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::Stop => self.stop.store(true, Ordering::SeqCst),
            Control::SummarizeNow(group) => {
                if let Err(e) = self.summarize_now(group.as_deref()).await {
                    warn!("summarize request rejected: {e}");
                }
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Day-rolled state for `group`.
    fn state(&mut self, group: &str, today: NaiveDate) -> &mut GroupState {
        let state = self.states.entry(group.to_string()).or_default();
        state.roll_day(today);
        state
    }

    fn status_line(&self) -> String {
        let today = self.clock.now().date();
        self.groups
            .keys()
            .map(|g| {
                let (held, sent) = self.states.get(g).map_or((0, false), |s| {
                    (s.records_for(today).len(), s.summarized_on(today))
                });
                let phase = match self.tracker.phase(g) {
                    Phase::AwaitingBaseline => "awaiting baseline".to_string(),
                    Phase::Polling => format!(
                        "at {}",
                        self.tracker.baseline(g).map_or("-", |id| id.0.as_str())
                    ),
                };
                format!(
                    "{g}: {phase}, {held} orders{}",
                    if sent { ", summarized" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
