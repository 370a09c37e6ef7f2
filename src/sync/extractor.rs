//! Body extractor: picks the primary body and collects attachments.

use crate::error::SyncError;
use crate::sync::types::{ContentKind, MessagePart, is_plain_text};

/// The inline part chosen as the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBody<'a> {
    pub kind: ContentKind,
    pub content: &'a [u8],
}

/// A named attachment, borrowed from its parent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef<'a> {
    pub filename: &'a str,
    pub content: &'a [u8],
}

/// Output of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBody<'a> {
    pub primary: PrimaryBody<'a>,
    pub attachments: Vec<AttachmentRef<'a>>,
}

/// Split a message's parts into its primary body and its attachments.
///
/// The first `text/plain` inline part wins; otherwise the first inline part
/// of any type is used. Attachments without a usable filename are dropped.
/// Fails with [`SyncError::NoBodyFound`] when there is no inline part at all.
pub fn extract(parts: &[MessagePart]) -> Result<ExtractedBody<'_>, SyncError> {
    let mut first_plain: Option<PrimaryBody<'_>> = None;
    let mut first_inline: Option<PrimaryBody<'_>> = None;
    let mut attachments = Vec::new();

    for part in parts {
        match part {
            MessagePart::Inline {
                content_type,
                content,
            } => {
                let body = PrimaryBody {
                    kind: ContentKind::from_mime(content_type),
                    content,
                };
                if first_plain.is_none() && is_plain_text(content_type) {
                    first_plain = Some(body.clone());
                }
                if first_inline.is_none() {
                    first_inline = Some(body);
                }
            }
            MessagePart::Attachment { filename, content } => {
                let filename = filename.trim();
                if filename.is_empty() {
                    tracing::debug!("Dropping attachment without filename");
                    continue;
                }
                attachments.push(AttachmentRef { filename, content });
            }
        }
    }

    let primary = first_plain.or(first_inline).ok_or(SyncError::NoBodyFound)?;
    Ok(ExtractedBody {
        primary,
        attachments,
    })
}
