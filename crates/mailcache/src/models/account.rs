//! Account model representing a cached mailbox identity

use crate::config::AccountConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account as stored in the cache
///
/// Passwords are never persisted; only the connection endpoints are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Database primary key
    pub id: i64,
    /// User-chosen name (unique)
    pub name: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_username: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// When the account was first cached
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Build an unsaved account row from its configuration (id assigned by the store)
    pub fn from_config(config: &AccountConfig) -> Self {
        Self {
            id: 0,
            name: config.name.clone(),
            imap_host: config.imap_host.clone(),
            imap_port: config.imap_port,
            imap_username: config.imap_username.clone(),
            smtp_host: config.smtp_host.clone(),
            smtp_port: config.smtp_port,
            smtp_username: config.smtp_username.clone(),
            created_at: Utc::now(),
        }
    }
}
