//! Normalize fetched messages to the canonical record

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, PartType};
use std::collections::HashMap;

use super::api::{RawAddress, RawMessage, SectionKey};
use crate::models::{EmailAddress, EmailRecord};

/// Strategy for finding the full-message bytes among fetched sections
///
/// Servers disagree on how the full content is keyed, so locators are tried
/// in [`ContentLocator::ORDER`] and the first non-empty result wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLocator {
    /// The unlabeled section (`RFC822` / `BODY[]`)
    Default,
    /// A section explicitly labeled with the empty string
    EmptyLabel,
    /// Whatever section is first non-empty
    FirstNonEmpty,
}

impl ContentLocator {
    pub const ORDER: [ContentLocator; 3] = [
        ContentLocator::Default,
        ContentLocator::EmptyLabel,
        ContentLocator::FirstNonEmpty,
    ];

    fn locate(self, message: &RawMessage) -> Option<&[u8]> {
        match self {
            ContentLocator::Default => message.section(&SectionKey::Default),
            ContentLocator::EmptyLabel => message.section(&SectionKey::Labeled(String::new())),
            ContentLocator::FirstNonEmpty => message
                .sections
                .iter()
                .map(|(_, bytes)| bytes.as_slice())
                .find(|bytes| !bytes.is_empty()),
        }
    }
}

/// Resolve the full-message bytes of a fetched message
pub fn resolve_content(message: &RawMessage) -> Option<(ContentLocator, &[u8])> {
    ContentLocator::ORDER
        .into_iter()
        .find_map(|locator| locator.locate(message).map(|bytes| (locator, bytes)))
}

/// Decoded parts of a message body
#[derive(Debug, Default)]
struct DecodedContent {
    subject: Option<String>,
    date: Option<DateTime<Utc>>,
    body_text: String,
    body_html: String,
    headers: HashMap<String, String>,
}

/// Convert a fetched message to an [`EmailRecord`]
///
/// Never fails: content that cannot be decoded becomes a lossy plain-text
/// body, and content that cannot be found leaves both bodies empty.
pub fn normalize_message(message: RawMessage) -> EmailRecord {
    let decoded = match resolve_content(&message) {
        Some((locator, bytes)) => {
            log::debug!(
                "uid {}: resolved {} content bytes via {:?}",
                message.uid,
                bytes.len(),
                locator
            );
            decode_content(message.uid, bytes)
        }
        None => {
            log::debug!(
                "uid {}: no content among {} section(s)",
                message.uid,
                message.sections.len()
            );
            DecodedContent::default()
        }
    };

    let envelope = &message.envelope;
    let sender = envelope.from.first().map(to_email_address).unwrap_or_default();

    let recipients = envelope
        .to
        .iter()
        .chain(&envelope.cc)
        .chain(&envelope.bcc)
        .map(RawAddress::address)
        .filter(|addr| !addr.is_empty())
        .collect();

    // Envelope subjects may still carry encoded words; the decoded header is better then
    let subject = match envelope.subject.as_deref() {
        Some(subject) if !subject.contains("=?") => subject.to_string(),
        other => decoded
            .subject
            .clone()
            .or_else(|| other.map(str::to_string))
            .unwrap_or_default(),
    };

    let date = envelope
        .date
        .as_deref()
        .and_then(parse_envelope_date)
        .or(decoded.date)
        .or(message.internal_date)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    EmailRecord::builder(message.uid)
        .message_id(envelope.message_id.clone().unwrap_or_default())
        .subject(subject)
        .sender(sender)
        .recipients(recipients)
        .date(date)
        .body_text(decoded.body_text)
        .body_html(decoded.body_html)
        .headers(decoded.headers)
        .flags(message.flags)
        .build()
}

fn to_email_address(addr: &RawAddress) -> EmailAddress {
    EmailAddress {
        name: addr.name.clone().filter(|n| !n.is_empty()),
        email: addr.address(),
    }
}

/// MIME-decode content, falling back to the raw bytes as text
fn decode_content(uid: u32, bytes: &[u8]) -> DecodedContent {
    let Some(parsed) = MessageParser::default().parse(bytes) else {
        log::warn!("uid {}: MIME decoding failed, keeping raw content as text", uid);
        return DecodedContent {
            body_text: String::from_utf8_lossy(bytes).into_owned(),
            ..DecodedContent::default()
        };
    };

    let body_text = parsed
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default();

    // body_html() would synthesize HTML from a text part; only keep real HTML
    let body_html = parsed
        .html_part(0)
        .and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    let mut headers = HashMap::new();
    for (name, value) in parsed.headers_raw() {
        headers
            .entry(name.to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    DecodedContent {
        subject: parsed.subject().map(str::to_string),
        date: parsed
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0)),
        body_text,
        body_html,
        headers,
    }
}

/// Parse an RFC 2822 envelope date, tolerating a trailing "(UTC)"-style comment
fn parse_envelope_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let without_comment = match trimmed.find(" (") {
        Some(idx) if trimmed.ends_with(')') => &trimmed[..idx],
        _ => trimmed,
    };

    DateTime::parse_from_rfc2822(without_comment)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
