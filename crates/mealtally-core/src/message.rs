use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque message ordinal assigned by the stream boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// A chat message as observed on the stream boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// `None` when the boundary could not identify the message.
    #[serde(default)]
    pub id: Option<MessageId>,
    /// Display name of the author.
    pub sender: String,
    pub content: String,
    /// Timestamp as shown by the chat client (free-form).
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    pub fn new(
        id: Option<MessageId>,
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sender: sender.into(),
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Short single-line preview for logs.
    pub fn preview(&self) -> String {
        if self.content.chars().count() > 30 {
            let truncated: String = self.content.chars().take(30).collect();
            format!("{truncated}...")
        } else {
            self.content.clone()
        }
    }
}

/// One sender's meal order (or attendance list) for a given day.
///
/// Field names on disk follow the ledger's column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(rename = "发送人")]
    pub sender: String,
    #[serde(rename = "订餐内容")]
    pub description: String,
    #[serde(rename = "订餐份数")]
    pub declared_count: u32,
    #[serde(rename = "是否人员名单", default)]
    pub is_headcount_list: bool,
    #[serde(rename = "发送时间", default)]
    pub timestamp: String,
}

impl OrderRecord {
    /// Identity key: first occurrence of `(sender, description)` wins.
    pub fn key(&self) -> (&str, &str) {
        (&self.sender, &self.description)
    }
}
