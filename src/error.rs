//! Error types for the mail-to-ticket bridge.

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Mailbox collaborator errors (connection, protocol, decoding).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP connection closed by server")]
    Closed,

    #[error("IMAP command {command} failed: {response}")]
    CommandFailed { command: String, response: String },

    #[error("Unexpected IMAP response: {0}")]
    Protocol(String),

    #[error("Mailbox task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tracker collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Tracker rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Tracker request failed: {0}")]
    Transport(String),

    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),

    #[error("Invalid tracker URL: {0}")]
    InvalidUrl(String),
}

/// Per-message synchronization errors.
///
/// These never escape the orchestrator's per-message loop; they are turned
/// into a `Skipped` or `Failed` outcome at the message boundary.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No inline body part found")]
    NoBodyFound,

    #[error("Tracker rejected {operation}: {detail}")]
    TrackerRejected {
        operation: &'static str,
        detail: String,
    },

    #[error("Ticket {key} referenced in subject does not exist")]
    DanglingTicketReference { key: String },

    #[error("Tracker transport failed during {operation}: {reason}")]
    TrackerTransportFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Mailbox operation failed: {0}")]
    MailboxOperationFailed(#[from] MailboxError),

    #[error("Attachment {filename} could not be dispatched: {reason}")]
    AttachmentDispatchFailed { filename: String, reason: String },
}

impl SyncError {
    /// Classify a tracker failure for the given operation.
    pub fn from_tracker(operation: &'static str, err: TrackerError) -> Self {
        match err {
            TrackerError::Transport(reason) => Self::TrackerTransportFailed { operation, reason },
            other => Self::TrackerRejected {
                operation,
                detail: other.to_string(),
            },
        }
    }

    /// Whether the next poll is expected to retry without human help.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::NoBodyFound)
    }
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
