//! Sync engine for fetching and caching mail
//!
//! Provides idempotent sync operations that can be safely retried.

mod account;

pub use account::{FolderFailure, FolderSyncStats, SyncOptions, SyncReport, sync_account};
