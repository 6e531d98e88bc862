//! Exclusive access to the chat stream: select, fetch, and send with
//! bounded waits and one retry on send.

use mealtally_core::{error::TallyError, message::Message, traits::MessageStream};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Run `fut` with a deadline, mapping expiry to `TallyError::Timeout`.
pub(super) async fn with_timeout<T, F>(
    limit: Duration,
    what: &str,
    fut: F,
) -> Result<T, TallyError>
where
    F: Future<Output = Result<T, TallyError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TallyError::Timeout(format!(
            "{what} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// The single session every stream call goes through.
pub struct StreamSession {
    stream: Mutex<Box<dyn MessageStream>>,
    io_timeout: Duration,
    retry_delay: Duration,
}

impl StreamSession {
    pub fn new(stream: Box<dyn MessageStream>, io_timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            stream: Mutex::new(stream),
            io_timeout,
            retry_delay,
        }
    }

    pub async fn name(&self) -> String {
        self.stream.lock().await.name().to_string()
    }

    /// Select `group` and fetch its visible messages as one exclusive step.
    pub async fn fetch(&self, group: &str) -> Result<Vec<Message>, TallyError> {
        let stream = self.stream.lock().await;
        select_group(stream.as_ref(), group, self.io_timeout).await?;
        with_timeout(self.io_timeout, "fetch", stream.fetch_messages()).await
    }

    /// Send `text` to `group`, retrying once after a delay and re-select.
    pub async fn send(&self, group: &str, text: &str) -> Result<(), TallyError> {
        let stream = self.stream.lock().await;
        match send_once(stream.as_ref(), group, text, self.io_timeout).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "send to {group} failed ({e}); retrying in {}ms",
                    self.retry_delay.as_millis()
                );
                tokio::time::sleep(self.retry_delay).await;
                send_once(stream.as_ref(), group, text, self.io_timeout).await
            }
        }
    }
}

async fn select_group(
    stream: &dyn MessageStream,
    group: &str,
    limit: Duration,
) -> Result<(), TallyError> {
    let found = with_timeout(limit, "select", stream.select_chat(group)).await?;
    if found {
        Ok(())
    } else {
        Err(TallyError::StreamUnavailable(format!(
            "chat '{group}' not found"
        )))
    }
}

async fn send_once(
    stream: &dyn MessageStream,
    group: &str,
    text: &str,
    limit: Duration,
) -> Result<(), TallyError> {
    select_group(stream, group, limit).await?;
    with_timeout(limit, "send", stream.send_message(text, group)).await
}
