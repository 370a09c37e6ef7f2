//! Subject classifier: new issue vs. reply to an existing ticket.
//!
//! A subject is a reply when it ends with a bracketed ticket key such as
//! `[OPS-9]`. Only the last bracket pair counts; earlier brackets
//! (`Re: [FOO] update [BAR-12]`) are ignored.

use regex::Regex;

use crate::sync::types::{Classification, TicketKey};

/// Trailing `[<project>-<digits>]`, where the project is any run of
/// non-bracket, non-whitespace characters.
const TICKET_SUFFIX_PATTERN: &str = r"\[([^\[\]\s]+-[0-9]+)\]$";

/// Stateless, total subject classifier.
#[derive(Debug, Clone)]
pub struct SubjectClassifier {
    ticket_suffix: Regex,
}

impl SubjectClassifier {
    pub fn new() -> Self {
        Self {
            ticket_suffix: Regex::new(TICKET_SUFFIX_PATTERN).unwrap(),
        }
    }

    /// Classify a subject line. Trailing whitespace from folded headers is ignored.
    pub fn classify(&self, subject: &str) -> Classification {
        self.ticket_suffix
            .captures(subject.trim_end())
            .and_then(|caps| caps.get(1))
            .and_then(|key| TicketKey::parse(key.as_str()))
            .map_or(Classification::NewIssue, |ticket_key| {
                Classification::Reply { ticket_key }
            })
    }
}

impl Default for SubjectClassifier {
    fn default() -> Self {
        Self::new()
    }
}
