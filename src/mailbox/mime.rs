//! Decode raw RFC 822 bytes into a [`MailMessage`] with `mail-parser`.

use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::sync::types::{MailMessage, MessageId, MessagePart, Sender};

/// Parse a raw message. Returns `None` when the bytes are not a message at all.
pub fn parse_message(id: MessageId, raw: &[u8]) -> Option<MailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let subject = parsed.subject().unwrap_or_default().to_string();
    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| Sender::new(a.name(), a.address().unwrap_or("unknown")))
        .unwrap_or_else(|| Sender::new(None, "unknown"));

    let parts = parsed.parts.iter().filter_map(convert_part).collect();

    Some(MailMessage {
        id,
        subject,
        sender,
        parts,
    })
}

/// Map one MIME leaf to a [`MessagePart`]. Multipart containers yield nothing.
fn convert_part(part: &mail_parser::MessagePart<'_>) -> Option<MessagePart> {
    let is_attachment = part
        .content_disposition()
        .is_some_and(|d| d.is_attachment())
        || part.attachment_name().is_some();

    match &part.body {
        PartType::Multipart(_) => None,
        PartType::Text(text) if !is_attachment => Some(MessagePart::inline(
            &declared_type(part).unwrap_or_else(|| "text/plain".to_string()),
            text.as_bytes(),
        )),
        PartType::Html(html) if !is_attachment => {
            Some(MessagePart::inline("text/html", html.as_bytes()))
        }
        _ => Some(MessagePart::attachment(
            part.attachment_name().unwrap_or_default(),
            part.contents(),
        )),
    }
}

/// `type/subtype` from the part's Content-Type header.
fn declared_type(part: &mail_parser::MessagePart<'_>) -> Option<String> {
    let ct = part.content_type()?;
    Some(match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
        None => ct.ctype().to_ascii_lowercase(),
    })
}
