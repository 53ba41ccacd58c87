//! Folder model representing a cached remote mailbox

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remote folder (e.g. "INBOX") as cached for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    /// Database primary key
    pub id: i64,
    pub account_id: i64,
    pub account_name: String,
    /// Display name
    pub name: String,
    /// Full server path, unique per account
    pub path: String,
    /// Message count reported by the server at the last sync
    pub message_count: u32,
    pub last_synced: Option<DateTime<Utc>>,
}
