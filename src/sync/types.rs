//! Shared types for the mailbox → tracker synchronization engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

// ── Mail message ────────────────────────────────────────────────────

/// Mailbox-assigned identifier (an IMAP UID for the IMAP adapter).
///
/// Opaque to the engine; only stable within one polling session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Message sender as shown in the `From` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Display name, if the header carried one.
    pub name: Option<String>,
    pub address: String,
}

impl Sender {
    pub fn new(name: Option<&str>, address: &str) -> Self {
        Self {
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            address: address.to_string(),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// One leaf part of a decoded email.
///
/// Closed set: a part is either rendered content or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    /// Body content, e.g. `text/plain` or `text/html`.
    Inline {
        content_type: String,
        content: Vec<u8>,
    },
    /// A file attachment. The filename may be empty when the sender's
    /// client did not provide a usable one.
    Attachment { filename: String, content: Vec<u8> },
}

impl MessagePart {
    pub fn inline(content_type: &str, content: impl Into<Vec<u8>>) -> Self {
        Self::Inline {
            content_type: content_type.to_string(),
            content: content.into(),
        }
    }

    pub fn attachment(filename: &str, content: impl Into<Vec<u8>>) -> Self {
        Self::Attachment {
            filename: filename.to_string(),
            content: content.into(),
        }
    }
}

/// Immutable view of one mailbox entry for the duration of a polling cycle.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: MessageId,
    pub subject: String,
    pub sender: Sender,
    /// Leaf parts in their original order.
    pub parts: Vec<MessagePart>,
}

// ── Content kind ────────────────────────────────────────────────────

/// How a body must be treated by the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Plain,
    Html,
}

impl ContentKind {
    /// Map a declared MIME type. Anything that is not HTML is treated as plain text.
    pub fn from_mime(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        if essence.eq_ignore_ascii_case("text/html") {
            Self::Html
        } else {
            Self::Plain
        }
    }
}

/// Whether a declared MIME type is `text/plain` (parameters ignored).
pub fn is_plain_text(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/plain"))
}

// ── Ticket key & classification ─────────────────────────────────────

/// The tracker's external identifier for an issue, e.g. `OPS-9`.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketKey(String);

impl TicketKey {
    /// Build a key from tracker or subject text. Returns `None` for blank input.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TicketKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "ticket key must not be empty".to_string())
    }
}

impl From<TicketKey> for String {
    fn from(key: TicketKey) -> Self {
        key.0
    }
}

/// Result of subject classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    NewIssue,
    Reply { ticket_key: TicketKey },
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Terminal outcome for one message in one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A new issue was created and the message was marked processed.
    Created { ticket_key: TicketKey },
    /// A comment was added and the message was marked processed.
    Commented { ticket_key: TicketKey },
    /// Nothing was sent; the message stays unprocessed and is retried next cycle.
    Skipped { reason: String },
    /// The message stays unprocessed; the reason is surfaced in the logs.
    Failed { reason: String },
}

impl SyncOutcome {
    /// Convert a per-message error into its terminal outcome.
    pub fn from_error(err: &SyncError) -> Self {
        if err.is_skip() {
            Self::Skipped {
                reason: err.to_string(),
            }
        } else {
            Self::Failed {
                reason: err.to_string(),
            }
        }
    }

    /// Ticket the message ended up on, if the tracker accepted it.
    pub fn ticket_key(&self) -> Option<&TicketKey> {
        match self {
            Self::Created { ticket_key } | Self::Commented { ticket_key } => Some(ticket_key),
            Self::Skipped { .. } | Self::Failed { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Commented { .. } => "commented",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Sanitized content sent to the tracker for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPayload {
    pub subject: String,
    pub body: String,
    pub sender: String,
}

impl TicketPayload {
    /// Summary line used when commenting: `"<subject> (<sender>)"`.
    pub fn comment_summary(&self) -> String {
        format!("{} ({})", self.subject, self.sender)
    }
}

/// Per-cycle counters, logged when a run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub created: usize,
    pub commented: usize,
    pub skipped: usize,
    pub failed: usize,
    pub attachments_sent: usize,
    pub attachments_failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created { .. } => self.created += 1,
            SyncOutcome::Commented { .. } => self.commented += 1,
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
    }
}
