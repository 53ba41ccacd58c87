//! Session capability traits
//!
//! The sync engine and repair path talk to a remote mailbox only through
//! these traits, so tests can script a server without any network I/O.

use anyhow::Result;

use super::api::{ComposedMessage, FetchRange, FolderStatus, RawMessage, RemoteFolder};
use crate::config::AccountConfig;

/// An open, authenticated session with one account's mail server
///
/// Sessions are stateful and used by one caller at a time.
pub trait MailSession: Send {
    /// List all selectable folders
    fn list_folders(&mut self) -> Result<Vec<RemoteFolder>>;

    /// Get the current status of a folder
    fn folder_status(&mut self, path: &str) -> Result<FolderStatus>;

    /// Fetch messages from a folder
    fn fetch_messages(&mut self, path: &str, range: FetchRange) -> Result<Vec<RawMessage>>;

    /// Send an outbound message
    fn send_message(&mut self, message: &ComposedMessage) -> Result<()>;

    /// End the session gracefully
    fn logout(&mut self) -> Result<()>;
}

/// Opens sessions for configured accounts
pub trait SessionConnector: Send + Sync {
    /// Connect and authenticate
    ///
    /// Unreachable hosts and rejected credentials are reported as
    /// [`crate::ConnectionError`].
    fn connect(&self, account: &AccountConfig) -> Result<Box<dyn MailSession>>;
}
