//! Mail cache - local, searchable cache of remote IMAP mailboxes
//!
//! This crate provides:
//! - Domain models (Account, Folder, Email)
//! - IMAP/SMTP sessions behind a connector trait
//! - Message normalization from raw fetched content
//! - SQLite storage with an FTS5 full-text index
//! - Idempotent sync of the most recent messages per folder
//! - Filtered and full-text search
//! - Email retrieval that repairs missing bodies from the server

pub mod accounts;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod remote;
pub mod search;
pub mod service;
pub mod storage;
pub mod sync;

pub use accounts::{AccountHandle, AccountRegistry};
pub use crate::config::{AccountConfig, MailConfig};
pub use error::{ConnectionError, InvalidInputError, NotFoundError, is_connection_error, is_not_found};
pub use models::{Account, Email, EmailAddress, EmailRecord, Folder};
pub use query::{get_email, list_folders};
pub use remote::api::{ComposedMessage, FetchRange, FolderStatus, RawMessage, RemoteFolder};
pub use remote::{ImapConnector, MailSession, SessionConnector, normalize_message};
pub use search::{EmailSummary, SearchFilters, SearchRequest, parse_query, search_fts};
pub use service::MailService;
pub use storage::{MailStore, SqliteMailStore};
pub use sync::{FolderFailure, FolderSyncStats, SyncOptions, SyncReport, sync_account};
