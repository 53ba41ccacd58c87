//! Storage trait definitions

use crate::models::{Account, Email, EmailRecord, Folder};
use crate::search::{EmailQuery, EmailSummary};
use anyhow::Result;

/// Trait for cache storage operations
///
/// All writes are upserts keyed by natural identity: account name,
/// (account, folder path) and (account, folder, UID). Upserts return the
/// row's surrogate id, which stays stable across rewrites.
pub trait MailStore: Send + Sync {
    /// Insert or update an account by name
    fn upsert_account(&self, account: &Account) -> Result<i64>;

    /// Look up an account id by name (NotFound if absent)
    fn get_account_id_by_name(&self, name: &str) -> Result<i64>;

    /// Remove an account and everything cached under it
    fn delete_account(&self, name: &str) -> Result<()>;

    /// Insert or update a folder, stamping it as synced now
    fn upsert_folder(
        &self,
        account_id: i64,
        name: &str,
        path: &str,
        message_count: u32,
    ) -> Result<i64>;

    /// Look up a folder id (NotFound if absent)
    fn get_folder_id(&self, account_id: i64, path: &str) -> Result<i64>;

    /// List folders, optionally for one account, ordered by account then path
    fn list_folders(&self, account_id: Option<i64>) -> Result<Vec<Folder>>;

    /// Insert or update an email and its full-text entry in one transaction
    fn upsert_email(&self, account_id: i64, folder_id: i64, record: &EmailRecord) -> Result<i64>;

    /// Get an email by surrogate id (NotFound if absent)
    fn get_email_by_id(&self, id: i64) -> Result<Email>;

    /// Check whether any email is cached, optionally for one account
    fn has_emails(&self, account_id: Option<i64>) -> Result<bool>;

    /// Run a search built by [`EmailQuery`]
    fn query_emails(&self, query: &EmailQuery) -> Result<Vec<EmailSummary>>;
}
