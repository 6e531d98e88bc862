mod defaults;


use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::TallyError;
use defaults::*;

/// Top-level mealtally configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    /// Monitored groups: group name → person to `@` in scheduled summaries.
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

/// Bot identity and general settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name members use to `@` the bot.
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Extra names that also count as mentioning the bot.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Sender value the stream uses for the bot's own messages.
    #[serde(default = "default_self_sender")]
    pub self_sender: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            aliases: Vec::new(),
            self_sender: default_self_sender(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl BotConfig {
    /// Every name that counts as a mention of the bot.
    pub fn mention_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for alias in &self.aliases {
            if !alias.is_empty() && !names.contains(alias) {
                names.push(alias.clone());
            }
        }
        names
    }
}

/// How the first poll of a group treats the messages already on screen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// Adopt the newest message as baseline without processing history.
    #[default]
    Seed,
    /// Also ingest today's orders from the initial visible batch.
    Reprocess,
}

/// Polling cadence, timeouts, and the daily summary window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Sleep after a tick in which every group failed.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    /// Budget for each select/fetch/send call.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
    #[serde(default = "default_send_retry_delay")]
    pub send_retry_delay_ms: u64,
    /// Start of the daily summary window, local time ("HH:MM").
    #[serde(default = "default_summary_time")]
    pub summary_time: String,
    /// Width of the summary window in minutes (inclusive).
    #[serde(default = "default_summary_window")]
    pub summary_window_minutes: u32,
    #[serde(default = "default_heartbeat_ticks")]
    pub heartbeat_every_ticks: u64,
    #[serde(default)]
    pub startup_mode: StartupMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            error_backoff_secs: default_error_backoff(),
            io_timeout_secs: default_io_timeout(),
            send_retry_delay_ms: default_send_retry_delay(),
            summary_time: default_summary_time(),
            summary_window_minutes: default_summary_window(),
            heartbeat_every_ticks: default_heartbeat_ticks(),
            startup_mode: StartupMode::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse `summary_time` into minutes since midnight.
    pub fn summary_start_minute(&self) -> Result<u32, TallyError> {
        let t = NaiveTime::parse_from_str(self.summary_time.trim(), "%H:%M").map_err(|e| {
            TallyError::Config(format!(
                "invalid summary_time '{}': {e}",
                self.summary_time
            ))
        })?;
        Ok(t.hour() * 60 + t.minute())
    }
}

/// Ledger location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_dir")]
    pub dir: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: default_ledger_dir(),
        }
    }
}

/// File-backed chat transcript boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: String,
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
    /// How many of the newest messages a fetch exposes.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            outbox_dir: default_outbox_dir(),
            history_depth: default_history_depth(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            groups: default_groups(),
            scheduler: SchedulerConfig::default(),
            ledger: LedgerConfig::default(),
            transcript: TranscriptConfig::default(),
        }
    }
}

impl Config {
    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.groups.is_empty() {
            return Err(TallyError::Config(
                "no groups configured; add at least one entry under [groups]".into(),
            ));
        }
        if self.bot.name.trim().is_empty() {
            return Err(TallyError::Config("bot.name must not be empty".into()));
        }
        if self.scheduler.poll_interval_secs == 0 || self.scheduler.io_timeout_secs == 0 {
            return Err(TallyError::Config(
                "poll_interval_secs and io_timeout_secs must be positive".into(),
            ));
        }
        if self.scheduler.heartbeat_every_ticks == 0 {
            return Err(TallyError::Config(
                "heartbeat_every_ticks must be positive".into(),
            ));
        }
        let start = self.scheduler.summary_start_minute()?;
        if start + self.scheduler.summary_window_minutes >= 24 * 60 {
            return Err(TallyError::Config(
                "summary window must end before midnight".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, TallyError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| TallyError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| TallyError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
