//! IMAP mailbox over TLS (rustls), blocking I/O run in `spawn_blocking`.
//!
//! "Processed" is a custom keyword (default `$TicketSynced`), not `\Seen`:
//! - list: `UID SEARCH NOT KEYWORD <kw>` then `UID FETCH <uid> (RFC822)`
//! - mark: `UID STORE <uid> +FLAGS (<kw>)`, then `UID MOVE` to the done
//!   folder when one is configured
//!
//! Each call opens its own session.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mailbox::{Mailbox, mime};
use crate::sync::types::{MailMessage, MessageId};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// IMAP implementation of [`Mailbox`].
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: &MailboxConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn list_unprocessed(&self) -> Result<Vec<MailMessage>, MailboxError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unprocessed(&cfg))
            .await
            .map_err(|e| MailboxError::Task(e.to_string()))?
    }

    async fn mark_processed(&self, id: &MessageId) -> Result<(), MailboxError> {
        let cfg = self.config.clone();
        let uid = id.0.clone();
        tokio::task::spawn_blocking(move || mark_processed(&cfg, &uid))
            .await
            .map_err(|e| MailboxError::Task(e.to_string()))?
    }
}

/// Fetch and decode every message lacking the processed keyword.
fn fetch_unprocessed(config: &MailboxConfig) -> Result<Vec<MailMessage>, MailboxError> {
    let mut session = ImapSession::open(config)?;

    let search = session.command(&format!(
        "UID SEARCH NOT KEYWORD {}",
        config.processed_keyword
    ))?;
    let uids = parse_search(&search);
    debug!(count = uids.len(), folder = %config.folder, "Unprocessed messages found");

    let mut messages = Vec::with_capacity(uids.len());
    for uid in &uids {
        let lines = session.command(&format!("UID FETCH {uid} (RFC822)"))?;
        let Some(raw) = lines.iter().find_map(|l| l.literals.first()) else {
            warn!(uid = %uid, "FETCH returned no message body; skipping");
            continue;
        };
        match mime::parse_message(MessageId(uid.clone()), raw) {
            Some(message) => messages.push(message),
            None => warn!(uid = %uid, "Could not decode message; left unprocessed"),
        }
    }

    session.logout();
    Ok(messages)
}

/// Flag one message processed and optionally move it away.
fn mark_processed(config: &MailboxConfig, uid: &str) -> Result<(), MailboxError> {
    if uid.is_empty() || !uid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MailboxError::Protocol(format!("invalid UID {uid:?}")));
    }

    let mut session = ImapSession::open(config)?;
    session.command(&format!(
        "UID STORE {uid} +FLAGS ({})",
        config.processed_keyword
    ))?;

    if let Some(folder) = &config.done_folder {
        session.command(&format!("UID MOVE {uid} {}", quote(folder)))?;
        debug!(uid = %uid, folder = %folder, "Moved processed message");
    }

    session.logout();
    Ok(())
}

/// Extract UIDs from `* SEARCH 1 2 3` lines.
fn parse_search(lines: &[ResponseLine]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.text.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter(|tok| tok.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Size of a trailing `{n}` literal announcement, if the line ends with one.
fn literal_len(line: &str) -> Option<usize> {
    let inner = line.trim_end_matches("\r\n").strip_suffix('}')?;
    let start = inner.rfind('{')?;
    inner[start + 1..].trim_end_matches('+').parse().ok()
}

// ── Session ─────────────────────────────────────────────────────────

/// One logical response line; literals are collected separately.
#[derive(Debug, Default)]
struct ResponseLine {
    text: String,
    literals: Vec<Vec<u8>>,
}

struct ImapSession {
    stream: BufReader<TlsStream>,
    next_tag: u32,
}

impl ImapSession {
    /// Connect, read the greeting, log in and select the configured folder.
    fn open(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|e| {
            MailboxError::ConnectFailed {
                host: config.host.clone(),
                port: config.port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        tcp.set_write_timeout(Some(SOCKET_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.host.clone())
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: BufReader::new(rustls::StreamOwned::new(conn, tcp)),
            next_tag: 1,
        };

        let greeting = session.read_response_line()?;
        if !greeting.text.starts_with("* OK") && !greeting.text.starts_with("* PREAUTH") {
            return Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.text
            )));
        }

        session
            .command(&format!(
                "LOGIN {} {}",
                quote(&config.username),
                quote(config.password.expose_secret())
            ))
            .map_err(|e| match e {
                // Never echo the credentials back into logs.
                MailboxError::CommandFailed { response, .. } => MailboxError::CommandFailed {
                    command: "LOGIN".into(),
                    response,
                },
                other => other,
            })?;
        session.command(&format!("SELECT {}", quote(&config.folder)))?;

        info!(host = %config.host, folder = %config.folder, "IMAP session opened");
        Ok(session)
    }

    /// Send a tagged command and collect untagged lines until its completion.
    /// Anything but a tagged `OK` is an error.
    fn command(&mut self, cmd: &str) -> Result<Vec<ResponseLine>, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        stream.flush()?;

        let done_prefix = format!("{tag} ");
        let mut lines = Vec::new();
        loop {
            let line = self.read_response_line()?;
            if let Some(status) = line.text.strip_prefix(&done_prefix) {
                if status.starts_with("OK") {
                    return Ok(lines);
                }
                let verb = cmd.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
                return Err(MailboxError::CommandFailed {
                    command: verb,
                    response: status.to_string(),
                });
            }
            lines.push(line);
        }
    }

    fn read_response_line(&mut self) -> Result<ResponseLine, MailboxError> {
        let mut line = ResponseLine::default();
        loop {
            let mut buf = Vec::new();
            if self.stream.read_until(b'\n', &mut buf)? == 0 {
                return Err(MailboxError::Closed);
            }
            let chunk = String::from_utf8_lossy(&buf);

            if let Some(len) = literal_len(&chunk) {
                line.text.push_str(chunk.trim_end_matches("\r\n"));
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                line.literals.push(literal);
                continue;
            }

            line.text.push_str(chunk.trim_end_matches("\r\n"));
            return Ok(line);
        }
    }

    fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!(error = %e, "IMAP logout failed");
        }
    }
}
