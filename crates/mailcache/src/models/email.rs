//! Email models: the normalized record and its cached form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An email address with optional display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Display name, or the empty string when there is none
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// A message as produced by normalization, before it is attached to an
/// account and folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Per-folder IMAP UID
    pub uid: u32,
    /// Message-ID header value (not guaranteed unique)
    pub message_id: String,
    pub subject: String,
    pub sender: EmailAddress,
    /// To, then Cc, then Bcc addresses
    pub recipients: Vec<String>,
    pub date: DateTime<Utc>,
    pub body_text: String,
    pub body_html: String,
    pub headers: HashMap<String, String>,
    pub flags: Vec<String>,
}

impl EmailRecord {
    /// Create a new record builder
    pub fn builder(uid: u32) -> EmailRecordBuilder {
        EmailRecordBuilder::new(uid)
    }

    /// True when neither a plain-text nor an HTML body is present
    pub fn has_no_body(&self) -> bool {
        self.body_text.is_empty() && self.body_html.is_empty()
    }
}

/// Builder for creating EmailRecord instances
pub struct EmailRecordBuilder {
    record: EmailRecord,
}

impl EmailRecordBuilder {
    fn new(uid: u32) -> Self {
        Self {
            record: EmailRecord {
                uid,
                message_id: String::new(),
                subject: String::new(),
                sender: EmailAddress::default(),
                recipients: Vec::new(),
                date: DateTime::<Utc>::UNIX_EPOCH,
                body_text: String::new(),
                body_html: String::new(),
                headers: HashMap::new(),
                flags: Vec::new(),
            },
        }
    }

    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.record.message_id = message_id.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.record.subject = subject.into();
        self
    }

    pub fn sender(mut self, sender: EmailAddress) -> Self {
        self.record.sender = sender;
        self
    }

    pub fn recipients(mut self, recipients: Vec<String>) -> Self {
        self.record.recipients = recipients;
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.record.date = date;
        self
    }

    pub fn body_text(mut self, body_text: impl Into<String>) -> Self {
        self.record.body_text = body_text.into();
        self
    }

    pub fn body_html(mut self, body_html: impl Into<String>) -> Self {
        self.record.body_html = body_html.into();
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.record.headers = headers;
        self
    }

    pub fn flags(mut self, flags: Vec<String>) -> Self {
        self.record.flags = flags;
        self
    }

    pub fn build(self) -> EmailRecord {
        self.record
    }
}

/// An email as stored in the cache, denormalized with its account and folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Cache surrogate id
    pub id: i64,
    pub account_id: i64,
    pub account_name: String,
    pub folder_id: i64,
    pub folder_path: String,
    pub uid: u32,
    pub message_id: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients: Vec<String>,
    pub date: DateTime<Utc>,
    pub body_text: String,
    pub body_html: String,
    pub headers: HashMap<String, String>,
    pub flags: Vec<String>,
    /// When this row was last written
    pub cached_at: DateTime<Utc>,
}

impl Email {
    pub fn has_no_body(&self) -> bool {
        self.body_text.is_empty() && self.body_html.is_empty()
    }

    /// The normalized record this row was written from
    pub fn to_record(&self) -> EmailRecord {
        let sender = if self.sender_name.is_empty() {
            EmailAddress::new(&self.sender_email)
        } else {
            EmailAddress::with_name(&self.sender_name, &self.sender_email)
        };

        EmailRecord {
            uid: self.uid,
            message_id: self.message_id.clone(),
            subject: self.subject.clone(),
            sender,
            recipients: self.recipients.clone(),
            date: self.date,
            body_text: self.body_text.clone(),
            body_html: self.body_html.clone(),
            headers: self.headers.clone(),
            flags: self.flags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_or_empty() {
        assert_eq!(EmailAddress::with_name("Ada", "ada@example.com").name_or_empty(), "Ada");
        assert_eq!(EmailAddress::new("ada@example.com").name_or_empty(), "");
    }

    #[test]
    fn test_builder_defaults() {
        let record = EmailRecord::builder(7).subject("Hello").build();
        assert_eq!(record.uid, 7);
        assert_eq!(record.subject, "Hello");
        assert_eq!(record.date, DateTime::<Utc>::UNIX_EPOCH);
        assert!(record.has_no_body());
    }

    #[test]
    fn test_to_record_keeps_sender() {
        let email = Email {
            id: 1,
            account_id: 1,
            account_name: "work".to_string(),
            folder_id: 1,
            folder_path: "INBOX".to_string(),
            uid: 3,
            message_id: "<m@example.com>".to_string(),
            subject: "Hi".to_string(),
            sender_name: String::new(),
            sender_email: "a@example.com".to_string(),
            recipients: vec!["b@example.com".to_string()],
            date: Utc::now(),
            body_text: "body".to_string(),
            body_html: String::new(),
            headers: HashMap::new(),
            flags: vec!["\\Seen".to_string()],
            cached_at: Utc::now(),
        };

        let record = email.to_record();
        assert_eq!(record.sender, EmailAddress::new("a@example.com"));
        assert_eq!(record.recipients, email.recipients);
        assert!(!record.has_no_body());
    }
}
