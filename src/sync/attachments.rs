//! Attachment dispatcher: best-effort upload of a message's files.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::SyncError;
use crate::sync::extractor::AttachmentRef;
use crate::sync::types::TicketKey;
use crate::tracker::Tracker;

/// What happened to a message's attachments.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: usize,
    pub failures: Vec<SyncError>,
}

/// Forwards attachments to a resolved ticket, one upload per file.
///
/// A failed upload is logged and recorded; it never affects the other
/// uploads or the message's processed state.
pub struct AttachmentDispatcher {
    tracker: Arc<dyn Tracker>,
}

impl AttachmentDispatcher {
    pub fn new(tracker: Arc<dyn Tracker>) -> Self {
        Self { tracker }
    }

    pub async fn dispatch(&self, key: &TicketKey, attachments: &[AttachmentRef<'_>]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for attachment in attachments {
            match self
                .tracker
                .add_attachment(key, attachment.filename, attachment.content)
                .await
            {
                Ok(()) => {
                    info!(
                        ticket = %key,
                        filename = attachment.filename,
                        bytes = attachment.content.len(),
                        "Attachment uploaded"
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        ticket = %key,
                        filename = attachment.filename,
                        error = %e,
                        "Attachment upload failed"
                    );
                    report.failures.push(SyncError::AttachmentDispatchFailed {
                        filename: attachment.filename.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
