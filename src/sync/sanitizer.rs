//! Content sanitizer: turns an arbitrary email body into plain, safe text.
//!
//! Steps, in order:
//! 1. HTML only: drop `<script>`/`<style>` blocks, then render the markup
//!    to readable text (tags and attributes are not carried over)
//! 2. Normalize `\r\n` and `\r` to `\n`
//! 3. Replace runs of control or binary-looking characters with one space
//! 4. Trim
//!
//! JSON escaping is not done here; see [`json_escape`].

use std::sync::LazyLock;

use regex::Regex;

use crate::sync::types::ContentKind;

/// Line width for rendered HTML.
const HTML_RENDER_WIDTH: usize = 120;

static ACTIVE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->").unwrap()
});

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Letters, marks, digits, punctuation, symbols, space separators (including
/// no-break space) and zero-width (non-)joiners survive, along with newline
/// and tab. The replacement character is treated as binary noise.
static SUSPICIOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\x{FFFD}|[^\p{L}\p{M}\p{N}\p{P}\p{S}\p{Zs}\x{200C}\x{200D}\n\t])+").unwrap()
});

/// Sanitize a raw body of the given kind. Total: never fails.
pub fn sanitize(raw: &[u8], kind: ContentKind) -> String {
    let text = String::from_utf8_lossy(raw);

    let text = match kind {
        ContentKind::Html => html_to_text(&text),
        ContentKind::Plain => text.into_owned(),
    };

    let text = normalize_newlines(&text);
    let text = SUSPICIOUS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Escape a value for embedding inside a JSON string literal (no surrounding quotes).
pub fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn html_to_text(html: &str) -> String {
    let without_active = ACTIVE_BLOCKS.replace_all(html, " ");
    match html2text::from_read(without_active.as_bytes(), HTML_RENDER_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "HTML rendering failed; falling back to tag stripping");
            strip_tags(&without_active)
        }
    }
}

/// Last-resort tag removal used when the HTML renderer gives up.
fn strip_tags(html: &str) -> String {
    let stripped = TAGS.replace_all(html, " ");
    stripped
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
