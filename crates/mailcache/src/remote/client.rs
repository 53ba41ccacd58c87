//! IMAP session over implicit TLS
//!
//! Uses the blocking `imap` client so it can be driven from any thread
//! without an async runtime.

use anyhow::Result;
use chrono::Utc;
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;

use super::api::{
    ComposedMessage, FetchRange, FolderStatus, RawAddress, RawEnvelope, RawMessage,
    RemoteFolder, SectionKey,
};
use super::session::{MailSession, SessionConnector};
use super::smtp::send_smtp;
use crate::config::AccountConfig;
use crate::error::ConnectionError;

/// Fetch items needed to normalize a message
///
/// `RFC822` (unlike `BODY[]`) is returned by every server we target, and
/// folders are opened with EXAMINE so fetching never sets `\Seen`.
const FETCH_QUERY: &str = "(UID FLAGS ENVELOPE INTERNALDATE RFC822)";

/// Connects to IMAP servers with `native-tls`
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

impl ImapConnector {
    pub fn new() -> Self {
        Self
    }
}

impl SessionConnector for ImapConnector {
    fn connect(&self, account: &AccountConfig) -> Result<Box<dyn MailSession>> {
        let host = account.imap_host.as_str();

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| ConnectionError::new(&account.name, e))?;

        let client = imap::connect((host, account.imap_port), host, &tls).map_err(|e| {
            ConnectionError::new(
                &account.name,
                format!("{}:{} unreachable: {}", host, account.imap_port, e),
            )
        })?;

        let session = client
            .login(&account.imap_username, &account.imap_password)
            .map_err(|(e, _)| {
                ConnectionError::new(&account.name, format!("login rejected: {}", e))
            })?;

        log::info!("Connected to {} for account {}", host, account.name);

        Ok(Box::new(ImapSession {
            account: account.clone(),
            session,
        }))
    }
}

/// An authenticated IMAP session for one account
pub struct ImapSession {
    account: AccountConfig,
    session: imap::Session<TlsStream<TcpStream>>,
}

impl ImapSession {
    /// Map an IMAP error, marking transport failures as connection errors
    fn map_err(&self, err: imap::Error, action: &str) -> anyhow::Error {
        match err {
            imap::Error::Io(_) | imap::Error::ConnectionLost => {
                ConnectionError::new(&self.account.name, format!("{}: {}", action, err)).into()
            }
            other => anyhow::anyhow!("{}: {}", action, other),
        }
    }

    fn examine(&mut self, path: &str) -> Result<u32> {
        match self.session.examine(path) {
            Ok(mailbox) => Ok(mailbox.exists),
            Err(e) => Err(self.map_err(e, &format!("Failed to open folder {}", path))),
        }
    }
}

impl MailSession for ImapSession {
    fn list_folders(&mut self) -> Result<Vec<RemoteFolder>> {
        let names = match self.session.list(None, Some("*")) {
            Ok(names) => names,
            Err(e) => return Err(self.map_err(e, "Failed to list folders")),
        };

        let folders = names
            .iter()
            .filter(|name| {
                !name
                    .attributes()
                    .iter()
                    .any(|attr| matches!(attr, imap::types::NameAttribute::NoSelect))
            })
            .map(|name| RemoteFolder::from_path(name.name(), name.delimiter()))
            .collect();

        Ok(folders)
    }

    fn folder_status(&mut self, path: &str) -> Result<FolderStatus> {
        let message_count = self.examine(path)?;
        Ok(FolderStatus { message_count })
    }

    fn fetch_messages(&mut self, path: &str, range: FetchRange) -> Result<Vec<RawMessage>> {
        let count = self.examine(path)?;

        let fetched = match range {
            FetchRange::Recent(window) => {
                if count == 0 || window == 0 {
                    return Ok(Vec::new());
                }
                let start = if count > window { count - window + 1 } else { 1 };
                self.session
                    .fetch(format!("{}:{}", start, count), FETCH_QUERY)
            }
            FetchRange::Uid(uid) => self.session.uid_fetch(uid.to_string(), FETCH_QUERY),
        };

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => return Err(self.map_err(e, &format!("Failed to fetch from {}", path))),
        };

        Ok(fetched.iter().filter_map(to_raw_message).collect())
    }

    fn send_message(&mut self, message: &ComposedMessage) -> Result<()> {
        send_smtp(&self.account, message)
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout().map_err(|e| {
            anyhow::anyhow!("Failed to log out of account {}: {}", self.account.name, e)
        })
    }
}

fn to_raw_message(fetch: &imap::types::Fetch) -> Option<RawMessage> {
    // Without a UID the message cannot be addressed again
    let Some(uid) = fetch.uid else {
        log::warn!("Skipping message {} fetched without UID", fetch.message);
        return None;
    };

    let mut message = RawMessage::new(uid);
    message.flags = fetch.flags().iter().map(|f| f.to_string()).collect();
    message.internal_date = fetch.internal_date().map(|d| d.with_timezone(&Utc));

    if let Some(envelope) = fetch.envelope() {
        message.envelope = RawEnvelope {
            date: envelope.date.as_deref().map(lossy),
            subject: envelope.subject.as_deref().map(lossy),
            message_id: envelope.message_id.as_deref().map(lossy),
            from: addresses(envelope.from.as_deref()),
            to: addresses(envelope.to.as_deref()),
            cc: addresses(envelope.cc.as_deref()),
            bcc: addresses(envelope.bcc.as_deref()),
        };
    }

    if let Some(body) = fetch.body() {
        message.sections.push((SectionKey::Default, body.to_vec()));
    }
    if let Some(text) = fetch.text() {
        message
            .sections
            .push((SectionKey::Labeled("TEXT".to_string()), text.to_vec()));
    }

    Some(message)
}

fn addresses(list: Option<&[imap_proto::types::Address<'_>]>) -> Vec<RawAddress> {
    list.unwrap_or_default()
        .iter()
        .map(|addr| RawAddress {
            name: addr.name.as_deref().map(lossy),
            mailbox: addr.mailbox.as_deref().map(lossy),
            host: addr.host.as_deref().map(lossy),
        })
        .collect()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
