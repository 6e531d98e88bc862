use thiserror::Error;

/// Top-level error type for mealtally.
#[derive(Debug, Error)]
pub enum TallyError {
    /// The chat could not be selected or its messages could not be fetched.
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    /// A boundary call exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Dispatching a message to a chat failed.
    #[error("send error: {0}")]
    Send(String),

    /// A ledger store or partition exists but cannot be parsed.
    #[error("ledger corrupt: {0}")]
    LedgerCorrupt(String),

    /// Ledger write/read failure.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
