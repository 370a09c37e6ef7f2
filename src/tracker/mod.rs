//! Issue tracker collaborator.
//!
//! The sync engine only talks to [`Tracker`]; `jira` is the REST
//! implementation used by the binary.

pub mod jira;
pub mod template;

use async_trait::async_trait;

use crate::error::TrackerError;
use crate::sync::types::TicketKey;

pub use jira::JiraTracker;
pub use template::PayloadTemplate;

/// Result of looking up a ticket by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLookup {
    Exists,
    NotFound,
}

/// Issue tracker operations used by the sync engine.
///
/// `Ok` means the tracker answered with its success status; every other
/// status is a [`TrackerError`].
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create an issue and return its key.
    async fn create_issue(&self, summary: &str, description: &str)
    -> Result<TicketKey, TrackerError>;

    /// Check whether an issue exists.
    async fn get_issue(&self, key: &TicketKey) -> Result<IssueLookup, TrackerError>;

    /// Append a comment to an existing issue.
    async fn add_comment(
        &self,
        key: &TicketKey,
        summary: &str,
        description: &str,
    ) -> Result<(), TrackerError>;

    /// Upload one file to an existing issue.
    async fn add_attachment(
        &self,
        key: &TicketKey,
        filename: &str,
        content: &[u8],
    ) -> Result<(), TrackerError>;
}
