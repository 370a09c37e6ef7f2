//! Mailbox → tracker synchronization engine.
//!
//! Every unprocessed message flows through:
//! 1. `classifier`: new issue or reply to `[KEY-n]`
//! 2. `extractor` + `sanitizer`: primary body as safe text, attachments
//! 3. `orchestrator`: tracker call, then mark processed on success
//! 4. `attachments`: best-effort uploads to the resolved ticket

pub mod attachments;
pub mod classifier;
pub mod extractor;
pub mod orchestrator;
pub mod sanitizer;
pub mod types;

pub use classifier::SubjectClassifier;
pub use orchestrator::SyncOrchestrator;
pub use types::{
    Classification, MailMessage, MessageId, MessagePart, RunSummary, Sender, SyncOutcome,
    TicketKey, TicketPayload,
};
