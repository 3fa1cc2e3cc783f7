//! IMAP source — read-only fetch of the newest INBOX messages over TLS.
//!
//! Blocking I/O on a rustls stream; `fetch_recent` moves it onto the
//! blocking pool.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::ImapConfig;
use crate::error::IngestError;
use crate::ingest::MailSource;
use crate::ingest::parse::parse_record;
use crate::store::Record;

/// Error type for blocking IMAP operations.
type ImapError = Box<dyn std::error::Error + Send + Sync>;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pulls recent messages from an IMAP INBOX without marking them seen.
pub struct ImapSource {
    config: ImapConfig,
}

impl ImapSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapSource {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Record>, IngestError> {
        let config = self.config.clone();
        let host = config.host.clone();
        let fetched = tokio::task::spawn_blocking(move || fetch_recent_imap(&config, limit))
            .await
            .map_err(|e| IngestError::FetchFailed {
                name: "imap".into(),
                reason: format!("fetch task panicked: {e}"),
            })?
            .map_err(|e| IngestError::FetchFailed {
                name: "imap".into(),
                reason: e.to_string(),
            })?;

        info!(host = %host, count = fetched.len(), "Fetched messages over IMAP");
        Ok(fetched)
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// One literal payload from an untagged response, with the line that announced
/// it and the remainder of the response after it.
struct Literal {
    header: String,
    data: Vec<u8>,
    trailer: String,
}

impl Literal {
    /// Servers may send the UID before or after the message body.
    fn uid(&self) -> Option<u32> {
        parse_uid(&self.header).or_else(|| parse_uid(&self.trailer))
    }
}

/// Everything the server sent for one tagged command.
struct CommandResponse {
    lines: Vec<String>,
    literals: Vec<Literal>,
}

struct ImapSession<S = TlsStream> {
    stream: BufReader<S>,
    next_tag: u32,
}

impl ImapSession<TlsStream> {
    fn connect(config: &ImapConfig) -> Result<Self, ImapError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.host.clone())?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)?;

        let mut session = ImapSession::new(rustls::StreamOwned::new(conn, tcp));
        session.read_greeting()?;
        Ok(session)
    }
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        }
    }

    fn read_greeting(&mut self) -> Result<(), ImapError> {
        let greeting = self.read_line()?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(format!("unexpected IMAP greeting: {}", greeting.trim()).into());
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, ImapError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err("IMAP connection closed".into());
        }
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    /// Send a command and collect its response up to the tagged status line.
    fn command(&mut self, cmd: &str) -> Result<CommandResponse, ImapError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        stream.flush()?;

        let mut response = CommandResponse {
            lines: Vec::new(),
            literals: Vec::new(),
        };
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&format!("{tag} ")) {
                if status.starts_with("OK") {
                    return Ok(response);
                }
                let verb = cmd.split_whitespace().next().unwrap_or(cmd);
                return Err(format!("IMAP {verb} failed: {}", status.trim()).into());
            }
            if let Some(len) = literal_len(&line) {
                let mut data = vec![0u8; len];
                self.stream.read_exact(&mut data)?;
                let trailer = self.read_line()?;
                response.literals.push(Literal {
                    header: line,
                    data,
                    trailer,
                });
            } else {
                response.lines.push(line);
            }
        }
    }
}

/// Fetch the newest `limit` INBOX messages, newest first (blocking).
fn fetch_recent_imap(config: &ImapConfig, limit: usize) -> Result<Vec<Record>, ImapError> {
    let mut session = ImapSession::connect(config)?;

    session.command(&format!(
        "LOGIN {} {}",
        quote(&config.username),
        quote(config.password.expose_secret())
    ))?;

    // EXAMINE is read-only: nothing gets flagged \Seen.
    let examine = session.command("EXAMINE \"INBOX\"")?;
    let exists = parse_exists(&examine.lines).unwrap_or(0);
    debug!(exists, "INBOX examined");

    let mut records = Vec::new();
    if let Some((start, end)) = fetch_range(exists, limit) {
        let fetch = session.command(&format!("FETCH {start}:{end} (UID RFC822)"))?;
        for literal in &fetch.literals {
            let fallback = literal.uid().map(|uid| format!("imap-uid-{uid}"));
            match parse_record(&literal.data, fallback.as_deref()) {
                Some(record) => records.push(record),
                None => warn!(header = %literal.header.trim(), "Skipping unparseable message"),
            }
        }
    }

    if let Err(e) = session.command("LOGOUT") {
        debug!(error = %e, "IMAP logout failed");
    }

    records.reverse();
    Ok(records)
}

// ── Protocol helpers ────────────────────────────────────────────────

/// IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Byte count of a `{N}` literal announced at the end of a line.
fn literal_len(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// Message count from an `* N EXISTS` line.
fn parse_exists(lines: &[String]) -> Option<u32> {
    lines.iter().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("*"), Some(n), Some(word)) if word.eq_ignore_ascii_case("EXISTS") => n.parse().ok(),
            _ => None,
        }
    })
}

/// UID from a `* 5 FETCH (UID 123 RFC822 {456}` line.
fn parse_uid(line: &str) -> Option<u32> {
    let mut parts = line.split(|c: char| c.is_whitespace() || c == '(' || c == ')');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("UID") {
            return parts.find(|p| !p.is_empty())?.parse().ok();
        }
    }
    None
}

/// Sequence range covering the newest `limit` of `exists` messages.
fn fetch_range(exists: u32, limit: usize) -> Option<(u32, u32)> {
    if exists == 0 || limit == 0 {
        return None;
    }
    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    let start = exists.saturating_sub(limit - 1).max(1);
    Some((start, exists))
}
