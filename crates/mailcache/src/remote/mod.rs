//! Remote mailbox integration
//!
//! This module provides:
//! - The session capability the sync engine consumes (`MailSession`)
//! - An IMAP connector over TLS and an SMTP sender
//! - Normalization of fetched messages into `EmailRecord`s

mod client;
mod normalize;
mod session;
mod smtp;

pub use client::ImapConnector;
pub use normalize::{ContentLocator, normalize_message, resolve_content};
pub use session::{MailSession, SessionConnector};
pub use smtp::{build_message, send_smtp};

/// Types exchanged with a remote session
pub mod api {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    /// A folder as listed by the server
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteFolder {
        /// Last path segment, for display
        pub name: String,
        /// Full server path used to select the folder
        pub path: String,
    }

    impl RemoteFolder {
        /// Build a folder from its server path and hierarchy delimiter
        pub fn from_path(path: impl Into<String>, delimiter: Option<&str>) -> Self {
            let path = path.into();
            let name = match delimiter {
                Some(delim) if !delim.is_empty() => {
                    path.rsplit(delim).next().unwrap_or(&path).to_string()
                }
                _ => path.clone(),
            };
            Self { name, path }
        }
    }

    /// Folder status as reported by the server
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FolderStatus {
        pub message_count: u32,
    }

    /// Which messages to fetch from a folder
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FetchRange {
        /// The most recent `n` messages by sequence number
        Recent(u32),
        /// Exactly the message with this UID
        Uid(u32),
    }

    /// An envelope address split the way IMAP returns it
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct RawAddress {
        pub name: Option<String>,
        pub mailbox: Option<String>,
        pub host: Option<String>,
    }

    impl RawAddress {
        /// Render as a bare `mailbox@host` address
        pub fn address(&self) -> String {
            match (self.mailbox.as_deref(), self.host.as_deref()) {
                (Some(mailbox), Some(host)) => format!("{}@{}", mailbox, host),
                (Some(mailbox), None) => mailbox.to_string(),
                (None, Some(host)) => host.to_string(),
                (None, None) => String::new(),
            }
        }
    }

    /// Message envelope as fetched
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct RawEnvelope {
        /// RFC 2822 date string
        pub date: Option<String>,
        pub subject: Option<String>,
        pub message_id: Option<String>,
        pub from: Vec<RawAddress>,
        pub to: Vec<RawAddress>,
        pub cc: Vec<RawAddress>,
        pub bcc: Vec<RawAddress>,
    }

    /// Key of a fetched content section
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SectionKey {
        /// The unlabeled full-message section (`RFC822` / `BODY[]`)
        Default,
        /// A section addressed by label, e.g. `TEXT` or `1.2`
        Labeled(String),
    }

    /// A fetched message before normalization
    #[derive(Debug, Clone, PartialEq)]
    pub struct RawMessage {
        pub uid: u32,
        pub envelope: RawEnvelope,
        pub flags: Vec<String>,
        pub internal_date: Option<DateTime<Utc>>,
        /// Content sections in the order the server returned them
        pub sections: Vec<(SectionKey, Vec<u8>)>,
    }

    impl RawMessage {
        pub fn new(uid: u32) -> Self {
            Self {
                uid,
                envelope: RawEnvelope::default(),
                flags: Vec::new(),
                internal_date: None,
                sections: Vec::new(),
            }
        }

        /// Bytes of the first non-empty section with the given key
        pub fn section(&self, key: &SectionKey) -> Option<&[u8]> {
            self.sections
                .iter()
                .find(|(k, bytes)| k == key && !bytes.is_empty())
                .map(|(_, bytes)| bytes.as_slice())
        }
    }

    /// An outbound message
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ComposedMessage {
        pub to: Vec<String>,
        #[serde(default)]
        pub cc: Vec<String>,
        #[serde(default)]
        pub bcc: Vec<String>,
        pub subject: String,
        pub body_text: String,
        #[serde(default)]
        pub body_html: Option<String>,
        #[serde(default)]
        pub reply_to: Option<String>,
        #[serde(default)]
        pub in_reply_to: Option<String>,
    }

}
