//! Sync orchestrator: drives each unprocessed message to a terminal outcome.
//!
//! Per message, strictly in this order:
//! 1. Classify the subject (new issue vs. reply to `[KEY-n]`)
//! 2. Extract and sanitize the body; no inline part → `Skipped`
//! 3. Create an issue, or confirm the ticket exists and comment on it
//! 4. Mark the message processed, only after the tracker accepted step 3
//! 5. Upload attachments to the resolved ticket (best effort)
//!
//! Any error stops the message at its boundary and leaves it unprocessed,
//! so the next cycle retries it. A reply to a missing ticket is never
//! turned into a new issue.
//!
//! A stop request is only honoured between messages: once a message has
//! been sent to the tracker it is always driven through marking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::error::{MailboxError, SyncError};
use crate::mailbox::Mailbox;
use crate::sync::attachments::{AttachmentDispatcher, DispatchReport};
use crate::sync::classifier::SubjectClassifier;
use crate::sync::extractor::{self, ExtractedBody};
use crate::sync::sanitizer::sanitize;
use crate::sync::types::{
    Classification, ContentKind, MailMessage, RunSummary, SyncOutcome, TicketKey, TicketPayload,
};
use crate::tracker::{IssueLookup, Tracker};

/// Everything that happened to one message in one cycle.
#[derive(Debug)]
pub struct MessageReport {
    pub outcome: SyncOutcome,
    pub attachments: DispatchReport,
}

/// Mailbox → tracker synchronization engine.
pub struct SyncOrchestrator {
    mailbox: Arc<dyn Mailbox>,
    tracker: Arc<dyn Tracker>,
    classifier: SubjectClassifier,
    dispatcher: AttachmentDispatcher,
}

impl SyncOrchestrator {
    pub fn new(mailbox: Arc<dyn Mailbox>, tracker: Arc<dyn Tracker>) -> Self {
        Self {
            mailbox,
            dispatcher: AttachmentDispatcher::new(Arc::clone(&tracker)),
            tracker,
            classifier: SubjectClassifier::new(),
        }
    }

    /// Run one polling cycle over every unprocessed message.
    ///
    /// Only a failure to list the mailbox aborts the run; per-message
    /// failures are recorded in the summary.
    pub async fn run_once(&self) -> Result<RunSummary, MailboxError> {
        self.run_until(&AtomicBool::new(false)).await
    }

    /// Like [`run_once`](Self::run_once), but checks `stop` before each
    /// message. Messages not yet started when it is set stay unprocessed.
    pub async fn run_until(&self, stop: &AtomicBool) -> Result<RunSummary, MailboxError> {
        let messages = self.mailbox.list_unprocessed().await?;
        let mut summary = RunSummary {
            fetched: messages.len(),
            ..RunSummary::default()
        };

        if messages.is_empty() {
            info!("No unprocessed messages");
            return Ok(summary);
        }

        info!(count = messages.len(), "Processing unprocessed messages");

        for (index, message) in messages.iter().enumerate() {
            if stop.load(Ordering::Relaxed) {
                warn!(
                    remaining = messages.len() - index,
                    "Stop requested; remaining messages left for the next run"
                );
                break;
            }
            let report = self.process_message(message).await;
            summary.record(&report.outcome);
            summary.attachments_sent += report.attachments.sent;
            summary.attachments_failed += report.attachments.failures.len();
        }

        info!(
            created = summary.created,
            commented = summary.commented,
            skipped = summary.skipped,
            failed = summary.failed,
            attachments_sent = summary.attachments_sent,
            attachments_failed = summary.attachments_failed,
            "Sync cycle complete"
        );
        Ok(summary)
    }

    /// Drive one message to its terminal outcome. Never fails: errors are
    /// converted to `Skipped`/`Failed` here.
    pub async fn process_message(&self, message: &MailMessage) -> MessageReport {
        let classification = self.classifier.classify(&message.subject);
        debug!(
            message_id = %message.id,
            subject = %message.subject,
            ?classification,
            "Classified message"
        );

        let extracted = match extractor::extract(&message.parts) {
            Ok(extracted) => extracted,
            Err(e) => return self.finish_with_error(message, &e),
        };

        let payload = build_payload(message, &extracted);

        let synced = match &classification {
            Classification::NewIssue => self.create_issue(&payload).await,
            Classification::Reply { ticket_key } => self.comment_on(ticket_key, &payload).await,
        };
        let outcome = match synced {
            Ok(outcome) => outcome,
            Err(e) => return self.finish_with_error(message, &e),
        };

        // Tracker accepted: this is the only path to the durability checkpoint.
        if let Err(e) = self.mailbox.mark_processed(&message.id).await {
            error!(
                message_id = %message.id,
                subject = %message.subject,
                ticket = ?outcome.ticket_key().map(TicketKey::as_str),
                error = %e,
                "Tracker accepted message but marking it processed failed; it will be seen again"
            );
            return self.finish_with_error(message, &SyncError::MailboxOperationFailed(e));
        }

        info!(
            message_id = %message.id,
            subject = %message.subject,
            ticket = ?outcome.ticket_key().map(TicketKey::as_str),
            outcome = outcome.label(),
            "Message synchronized"
        );

        let attachments = match outcome.ticket_key() {
            Some(key) if !extracted.attachments.is_empty() => {
                self.dispatcher.dispatch(key, &extracted.attachments).await
            }
            _ => DispatchReport::default(),
        };

        MessageReport {
            outcome,
            attachments,
        }
    }

    async fn create_issue(&self, payload: &TicketPayload) -> Result<SyncOutcome, SyncError> {
        let ticket_key = self
            .tracker
            .create_issue(&payload.subject, &payload.body)
            .await
            .map_err(|e| SyncError::from_tracker("create issue", e))?;
        Ok(SyncOutcome::Created { ticket_key })
    }

    async fn comment_on(
        &self,
        key: &TicketKey,
        payload: &TicketPayload,
    ) -> Result<SyncOutcome, SyncError> {
        let lookup = self
            .tracker
            .get_issue(key)
            .await
            .map_err(|e| SyncError::from_tracker("get issue", e))?;

        if lookup == IssueLookup::NotFound {
            return Err(SyncError::DanglingTicketReference {
                key: key.to_string(),
            });
        }

        self.tracker
            .add_comment(key, &payload.comment_summary(), &payload.body)
            .await
            .map_err(|e| SyncError::from_tracker("add comment", e))?;

        Ok(SyncOutcome::Commented {
            ticket_key: key.clone(),
        })
    }

    fn finish_with_error(&self, message: &MailMessage, err: &SyncError) -> MessageReport {
        let outcome = SyncOutcome::from_error(err);
        if err.is_skip() {
            warn!(
                message_id = %message.id,
                subject = %message.subject,
                error = %err,
                "Message skipped; left unprocessed for the next cycle"
            );
        } else {
            error!(
                message_id = %message.id,
                subject = %message.subject,
                error = %err,
                "Message failed; left unprocessed"
            );
        }
        MessageReport {
            outcome,
            attachments: DispatchReport::default(),
        }
    }
}

/// Sanitize subject, body and sender into the tracker payload.
pub fn build_payload(message: &MailMessage, extracted: &ExtractedBody<'_>) -> TicketPayload {
    TicketPayload {
        subject: sanitize(message.subject.as_bytes(), ContentKind::Plain),
        body: sanitize(extracted.primary.content, extracted.primary.kind),
        sender: sanitize(message.sender.to_string().as_bytes(), ContentKind::Plain),
    }
}
