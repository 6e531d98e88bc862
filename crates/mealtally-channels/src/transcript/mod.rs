//! JSONL transcript boundary.
//!
//! Each monitored group is a file `<inbox_dir>/<group>.jsonl` holding one
//! JSON message per line, oldest first, appended by whatever bridges the
//! real chat client. Outgoing messages are appended to
//! `<outbox_dir>/<group>.jsonl` for the bridge to deliver.

mod stream;
pub(crate) mod types;


use mealtally_core::{config::TranscriptConfig, sanitize, shellexpand};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// File-backed chat stream.
pub struct TranscriptStream {
    inbox_dir: PathBuf,
    outbox_dir: PathBuf,
    history_depth: usize,
    /// Group focused by the last successful `select_chat`.
    selected: Mutex<Option<String>>,
}

impl TranscriptStream {
    /// Create a transcript stream from config.
    pub fn new(config: &TranscriptConfig) -> Self {
        Self {
            inbox_dir: PathBuf::from(shellexpand(&config.inbox_dir)),
            outbox_dir: PathBuf::from(shellexpand(&config.outbox_dir)),
            history_depth: config.history_depth.max(1),
            selected: Mutex::new(None),
        }
    }

    pub(crate) fn inbox_path(&self, group: &str) -> PathBuf {
        self.inbox_dir
            .join(format!("{}.jsonl", sanitize::file_component(group)))
    }

    pub(crate) fn outbox_path(&self, group: &str) -> PathBuf {
        self.outbox_dir
            .join(format!("{}.jsonl", sanitize::file_component(group)))
    }
}
