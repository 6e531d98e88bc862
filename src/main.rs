mod gateway;
mod orders;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mealtally_channels::TranscriptStream;
use mealtally_core::{
    config::{self, Config},
    shellexpand,
    traits::SystemClock,
};
use mealtally_ledger::LedgerStore;
use orders::{parse_order, MentionDetector, SummaryEngine, SUMMARY_MARKER};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "mealtally",
    version,
    about = "Group-chat meal order tally and daily summaries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured groups until Ctrl-C.
    Start,
    /// Send today's summary right away. Refuses while `start` is running;
    /// send that process SIGUSR1 instead.
    Summary {
        /// Only this group (default: every configured group).
        #[arg(long)]
        group: Option<String>,
    },
    /// Print per-group totals from the ledger.
    Counts {
        /// Day to report, YYYY-MM-DD (default: today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show how a line of chat text would be classified.
    Check {
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_tracing(&cfg);

    match cli.command {
        Commands::Start => {
            let pid_file = pid_path(&cfg);
            if let Some(pid) = running_instance(&pid_file) {
                anyhow::bail!(
                    "mealtally is already running (pid {pid}); remove {} if it is stale",
                    pid_file.display()
                );
            }
            let gw = build_gateway(&cfg)?;
            if let Some(parent) = pid_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&pid_file, std::process::id().to_string())?;
            let handle = gw.handle();

            let stopper = handle.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal");
                    stopper.stop();
                }
            });

            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut usr1 = signal(SignalKind::user_defined1())?;
                tokio::spawn(async move {
                    while usr1.recv().await.is_some() {
                        if let Err(e) = handle.request_summary(None).await {
                            warn!("summary request dropped: {e}");
                        }
                    }
                });
            }

            println!("mealtally: watching {} group(s)", cfg.groups.len());
            gw.run().await;
            if let Err(e) = std::fs::remove_file(&pid_file) {
                warn!("failed to remove {}: {e}", pid_file.display());
            }
        }
        Commands::Summary { group } => {
            // The running loop owns the chat session.
            let pid_file = pid_path(&cfg);
            if let Some(pid) = running_instance(&pid_file) {
                anyhow::bail!(
                    "mealtally is running (pid {pid}); use `kill -USR1 {pid}` to request \
                     summaries from it (remove {} if it is stale)",
                    pid_file.display()
                );
            }
            let mut gw = build_gateway(&cfg)?;
            let sent = gw.summarize_now(group.as_deref()).await?;
            println!("sent {sent} summary message(s)");
        }
        Commands::Counts { date } => {
            let ledger = LedgerStore::from_config(&cfg.ledger)?;
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            print!("{}", counts_report(&cfg, &ledger, date));
        }
        Commands::Check { text } => {
            if text.is_empty() {
                anyhow::bail!("no text provided. Usage: mealtally check <text>");
            }
            let text = text.join(" ");
            print!("{}", describe(&cfg, &text));
        }
    }

    Ok(())
}

/// Terminal output plus a daily rolling file under `<data_dir>/logs`.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.bot.log_level.as_str()));
    let log_dir = PathBuf::from(shellexpand(&cfg.bot.data_dir)).join("logs");

    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "mealtally.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("mealtally: file logging disabled ({}): {e}", log_dir.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// Marker written by `start` while the polling loop runs.
fn pid_path(cfg: &Config) -> PathBuf {
    PathBuf::from(shellexpand(&cfg.bot.data_dir)).join("mealtally.pid")
}

/// Pid recorded in `pid_file`, if any.
fn running_instance(pid_file: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_file).ok()?.trim().parse().ok()
}

fn build_gateway(cfg: &Config) -> anyhow::Result<gateway::Gateway> {
    let stream = TranscriptStream::new(&cfg.transcript);
    let ledger = LedgerStore::from_config(&cfg.ledger)?;
    Ok(gateway::Gateway::new(
        cfg,
        Box::new(stream),
        Arc::new(ledger),
        Arc::new(SystemClock),
    )?)
}

/// Per-group totals for `date`, plus the days the month store holds.
fn counts_report(cfg: &Config, ledger: &LedgerStore, date: NaiveDate) -> String {
    let engine = SummaryEngine::new(cfg.bot.self_sender.clone());
    let mut out = format!("{date} (ledger: {})\n", ledger.dir().display());
    for group in cfg.groups.keys() {
        match ledger.read_day(group, date) {
            Ok(Some(rows)) => {
                out.push_str(&format!("  {group}: {}\n", engine.aggregate(&rows).short()))
            }
            Ok(None) => out.push_str(&format!("  {group}: no orders\n")),
            Err(e) => out.push_str(&format!("  {group}: unreadable ({e})\n")),
        }
        if let Ok(days) = ledger.partition_dates(group, date) {
            if !days.is_empty() {
                out.push_str(&format!("    days on record this month: {}\n", days.join(", ")));
            }
        }
    }
    out
}

/// Operator-facing classification of one line of chat text.
fn describe(cfg: &Config, text: &str) -> String {
    let mut out = String::new();
    let mentions = MentionDetector::new(cfg.bot.mention_names());
    if mentions.is_mentioned(text) {
        out.push_str("mention: yes\n");
    }
    if text.contains(SUMMARY_MARKER) {
        out.push_str("summary message: never counted as an order\n");
        return out;
    }
    match parse_order(text) {
        Some(order) if order.is_headcount_list => out.push_str(&format!(
            "headcount list: \"{}\" declared {} ({} names listed)\n",
            order.description,
            order.declared_count,
            orders::listed_names(&order.description)
        )),
        Some(order) => out.push_str(&format!(
            "portion order: \"{}\" x{}\n",
            order.description, order.declared_count
        )),
        None => out.push_str("not an order\n"),
    }
    out
}
