use serde::Serialize;

/// One line of the outbox file.
#[derive(Debug, Serialize)]
pub(crate) struct OutboxLine<'a> {
    pub group: &'a str,
    pub sender: &'a str,
    pub content: &'a str,
    pub timestamp: String,
}
