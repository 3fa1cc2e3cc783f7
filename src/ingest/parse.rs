//! RFC 822 / MIME decoding into `Record`s.

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser};
use tracing::warn;
use uuid::Uuid;

use crate::store::Record;

/// Bodies longer than this are truncated.
pub const MAX_CONTENT_CHARS: usize = 12_000;

/// Parse a raw message into a record.
///
/// `fallback_id` is used when the message has no Message-ID header; without
/// either a `gen-<uuid>` id is generated. Returns `None` if the bytes are not
/// a parseable message.
pub fn parse_record(raw: &[u8], fallback_id: Option<&str>) -> Option<Record> {
    let parsed = MessageParser::default().parse(raw)?;

    let id = parsed
        .message_id()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| fallback_id.map(str::to_string))
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let sender = format_addresses(parsed.from())
        .into_iter()
        .next()
        .unwrap_or_default();
    let recipient = format_addresses(parsed.to()).join(", ");
    let subject = parsed.subject().unwrap_or_default().trim().to_string();

    let timestamp = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(|| {
            warn!(id = %id, "Missing or unparseable Date header, using current time");
            Utc::now()
        });

    let content = truncate_chars(&extract_text(&parsed), MAX_CONTENT_CHARS);

    Some(Record {
        id,
        sender,
        recipient,
        timestamp,
        subject,
        content,
    })
}

/// Render each address as `Name <addr>`, or the bare address/name.
fn format_addresses(addr: Option<&Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    let addrs: Vec<&mail_parser::Addr> = match addr {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    addrs
        .into_iter()
        .filter_map(|a| {
            let name = a.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
            let email = a.address.as_deref().map(str::trim).filter(|e| !e.is_empty());
            match (name, email) {
                (Some(n), Some(e)) if n != e => Some(format!("{n} <{e}>")),
                (_, Some(e)) => Some(e.to_string()),
                (Some(n), None) => Some(n.to_string()),
                (None, None) => None,
            }
        })
        .collect()
}

/// Plain-text body, falling back to stripped HTML.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SIMPLE: &str = "From: John Doe <john@example.com>\r\n\
        To: Me <me@example.com>, other@example.com\r\n\
        Subject: Quarterly report\r\n\
        Date: Tue, 04 Mar 2025 10:15:00 +0100\r\n\
        Message-ID: <abc123@example.com>\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        Numbers attached.\r\n";

    #[test]
    fn parses_headers_and_body() {
        let record = parse_record(SIMPLE.as_bytes(), None).unwrap();
        assert_eq!(record.id, "abc123@example.com");
        assert_eq!(record.sender, "John Doe <john@example.com>");
        assert_eq!(record.recipient, "Me <me@example.com>, other@example.com");
        assert_eq!(record.subject, "Quarterly report");
        assert_eq!(record.content, "Numbers attached.");
        // 10:15 +01:00 is 09:15 UTC
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 4, 9, 15, 0).unwrap()
        );
    }

    #[test]
    fn missing_message_id_uses_fallback_then_generated() {
        let raw = "From: a@example.com\r\nSubject: x\r\nDate: Tue, 04 Mar 2025 10:15:00 +0000\r\n\r\nbody\r\n";
        let record = parse_record(raw.as_bytes(), Some("imap-uid-7")).unwrap();
        assert_eq!(record.id, "imap-uid-7");

        let record = parse_record(raw.as_bytes(), None).unwrap();
        assert!(record.id.starts_with("gen-"));
    }

    #[test]
    fn missing_headers_default_to_empty() {
        let raw = "Message-ID: <m@x>\r\n\r\nonly a body\r\n";
        let before = Utc::now();
        let record = parse_record(raw.as_bytes(), None).unwrap();
        assert_eq!(record.sender, "");
        assert_eq!(record.recipient, "");
        assert_eq!(record.subject, "");
        assert!(record.timestamp >= before - chrono::Duration::seconds(1));
    }

    #[test]
    fn multipart_prefers_plain_text() {
        let raw = "From: a@example.com\r\n\
            Message-ID: <mp@x>\r\n\
            MIME-Version: 1.0\r\n\
            Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
            \r\n\
            --b1\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            Plain version\r\n\
            --b1\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <p>HTML version</p>\r\n\
            --b1--\r\n";
        let record = parse_record(raw.as_bytes(), None).unwrap();
        assert_eq!(record.content, "Plain version");
    }

    #[test]
    fn base64_body_is_decoded() {
        let raw = "From: a@example.com\r\n\
            Message-ID: <b64@x>\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            SGVsbG8gZnJvbSBiYXNlNjQ=\r\n";
        let record = parse_record(raw.as_bytes(), None).unwrap();
        assert_eq!(record.content, "Hello from base64");
    }

    #[test]
    fn long_content_is_truncated() {
        let body = "x".repeat(MAX_CONTENT_CHARS + 500);
        let raw = format!("From: a@example.com\r\nMessage-ID: <long@x>\r\n\r\n{body}\r\n");
        let record = parse_record(raw.as_bytes(), None).unwrap();
        assert_eq!(record.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_html("no tags"), "no tags");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
