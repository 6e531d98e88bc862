use crate::{error::TallyError, message::Message};
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Chat stream boundary — the one session the bot talks through.
///
/// Calls follow select-then-fetch/send ordering. Implementations must
/// tolerate repeated `select_chat` calls for the same group.
#[async_trait]
pub trait MessageStream: Send + Sync {
    /// Human-readable boundary name.
    fn name(&self) -> &str;

    /// Focus a group chat. Returns `false` when the chat cannot be found.
    async fn select_chat(&self, group: &str) -> Result<bool, TallyError>;

    /// Messages currently visible in the selected chat, oldest first.
    async fn fetch_messages(&self) -> Result<Vec<Message>, TallyError>;

    /// Send a text message to a group.
    async fn send_message(&self, text: &str, group: &str) -> Result<(), TallyError>;
}

/// Local wall-clock source for day boundaries and the summary window.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// `Clock` backed by the system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
