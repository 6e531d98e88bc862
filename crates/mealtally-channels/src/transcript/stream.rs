//! `MessageStream` implementation over transcript files.

use super::types::OutboxLine;
use super::TranscriptStream;
use async_trait::async_trait;
use mealtally_core::{error::TallyError, message::Message, traits::MessageStream};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[async_trait]
impl MessageStream for TranscriptStream {
    fn name(&self) -> &str {
        "transcript"
    }

    async fn select_chat(&self, group: &str) -> Result<bool, TallyError> {
        let path = self.inbox_path(group);
        let found = tokio::fs::try_exists(&path).await?;
        if found {
            *self.selected.lock().await = Some(group.to_string());
        } else {
            debug!("transcript: no inbox for {group} at {}", path.display());
        }
        Ok(found)
    }

    async fn fetch_messages(&self) -> Result<Vec<Message>, TallyError> {
        let group = self
            .selected
            .lock()
            .await
            .clone()
            .ok_or_else(|| TallyError::StreamUnavailable("no chat selected".into()))?;

        let path = self.inbox_path(&group);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            TallyError::StreamUnavailable(format!("failed to read {}: {e}", path.display()))
        })?;

        Ok(parse_transcript(&content, self.history_depth, &group))
    }

    async fn send_message(&self, text: &str, group: &str) -> Result<(), TallyError> {
        tokio::fs::create_dir_all(&self.outbox_dir)
            .await
            .map_err(|e| TallyError::Send(format!("failed to create outbox dir: {e}")))?;

        let line = OutboxLine {
            group,
            sender: "self",
            content: text,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let mut body = serde_json::to_string(&line)?;
        body.push('\n');

        let path = self.outbox_path(group);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TallyError::Send(format!("failed to open {}: {e}", path.display())))?;
        file.write_all(body.as_bytes())
            .await
            .map_err(|e| TallyError::Send(format!("failed to write {}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| TallyError::Send(format!("failed to flush {}: {e}", path.display())))?;
        Ok(())
    }
}

/// Parse transcript lines, keeping only the newest `depth` messages.
/// Malformed lines are skipped.
pub(crate) fn parse_transcript(content: &str, depth: usize, group: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Message>(line) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("transcript: {group} line {} skipped: {e}", n + 1);
                None
            }
        })
        .collect();
    if messages.len() > depth {
        messages.drain(..messages.len() - depth);
    }
    messages
}
