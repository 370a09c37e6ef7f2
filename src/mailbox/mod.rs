//! Mailbox collaborator.
//!
//! The sync engine only talks to [`Mailbox`]. `imap` is the IMAP-over-TLS
//! implementation and `mime` turns raw RFC 822 bytes into [`MailMessage`]s.

pub mod imap;
pub mod mime;

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::sync::types::{MailMessage, MessageId};

pub use imap::ImapMailbox;

/// Source of messages to synchronize.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch every message not yet marked processed, in mailbox order.
    async fn list_unprocessed(&self) -> Result<Vec<MailMessage>, MailboxError>;

    /// Durably mark a message processed. A marked message must not be
    /// returned by later `list_unprocessed` calls.
    async fn mark_processed(&self, id: &MessageId) -> Result<(), MailboxError>;
}
