//! Account and folder sync

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use crate::accounts::{AccountHandle, AccountRegistry};
use crate::models::{Account, EmailRecord};
use crate::remote::api::{FetchRange, RemoteFolder};
use crate::remote::normalize_message;
use crate::storage::MailStore;

/// Options controlling a sync pass
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Number of most recent messages fetched per folder
    pub window: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { window: 100 }
    }
}

/// Statistics for one synced folder
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSyncStats {
    pub folder: String,
    /// Message count reported by the server
    pub message_count: u32,
    /// Number of messages fetched in the recent window
    pub messages_fetched: usize,
    /// Number of messages written to the cache
    pub messages_stored: usize,
    /// Number of messages that failed to store
    pub errors: usize,
}

/// A folder that could not be synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderFailure {
    pub folder: String,
    pub error: String,
}

/// Outcome of syncing an account
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub account: String,
    pub folders: Vec<FolderSyncStats>,
    pub failed_folders: Vec<FolderFailure>,
    /// Duration of the sync operation
    pub duration_ms: u64,
}

impl SyncReport {
    /// Total messages written across all folders
    pub fn messages_stored(&self) -> usize {
        self.folders.iter().map(|f| f.messages_stored).sum()
    }

    /// True when every folder synced and every message was stored
    pub fn is_complete(&self) -> bool {
        self.failed_folders.is_empty() && self.folders.iter().all(|f| f.errors == 0)
    }
}

/// Sync one folder, or every folder, of an account into the cache
///
/// The account row is upserted first so changed connection settings are
/// recorded. With a folder path, that folder's failure is returned. Without
/// one, the folder listing must succeed, then every listed folder is
/// attempted: a folder that fails, including on a dropped connection, is
/// recorded in the report and skipped. The next folder reconnects.
///
/// Re-running is safe: emails are upserted by (account, folder, UID).
pub fn sync_account(
    registry: &mut AccountRegistry,
    store: &dyn MailStore,
    account_name: &str,
    folder: Option<&str>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let start = Instant::now();
    let handle = registry.get(account_name)?;
    let account_id = store.upsert_account(&Account::from_config(handle.config()))?;

    let mut report = SyncReport {
        account: account_name.to_string(),
        ..SyncReport::default()
    };

    match folder.filter(|f| !f.is_empty()) {
        Some(path) => {
            let remote = RemoteFolder::from_path(path, None);
            let stats = sync_folder(handle, store, account_id, &remote, options)
                .with_context(|| format!("Failed to sync {}/{}", account_name, path))?;
            report.folders.push(stats);
        }
        None => {
            let folders = handle.run(|session| session.list_folders())?;
            log::info!(
                "[SYNC] Account {}: syncing {} folder(s)",
                account_name,
                folders.len()
            );

            for remote in &folders {
                match sync_folder(handle, store, account_id, remote, options) {
                    Ok(stats) => report.folders.push(stats),
                    Err(e) => {
                        log::warn!(
                            "[SYNC] Skipping folder {} of {}: {:#}",
                            remote.path,
                            account_name,
                            e
                        );
                        report.failed_folders.push(FolderFailure {
                            folder: remote.path.clone(),
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "[SYNC] Account {} done: {} folder(s), {} failed, {} message(s) stored in {}ms",
        account_name,
        report.folders.len(),
        report.failed_folders.len(),
        report.messages_stored(),
        report.duration_ms
    );

    Ok(report)
}

/// Refresh one folder's status and its most recent messages
fn sync_folder(
    handle: &mut AccountHandle,
    store: &dyn MailStore,
    account_id: i64,
    remote: &RemoteFolder,
    options: &SyncOptions,
) -> Result<FolderSyncStats> {
    let status = handle.run(|session| session.folder_status(&remote.path))?;
    let folder_id =
        store.upsert_folder(account_id, &remote.name, &remote.path, status.message_count)?;

    let mut stats = FolderSyncStats {
        folder: remote.path.clone(),
        message_count: status.message_count,
        ..FolderSyncStats::default()
    };

    if status.message_count == 0 {
        return Ok(stats);
    }

    let raw = handle.run(|session| {
        session.fetch_messages(&remote.path, FetchRange::Recent(options.window))
    })?;
    stats.messages_fetched = raw.len();

    // Decoding is CPU-bound and independent per message; writes stay sequential
    let records: Vec<EmailRecord> = raw.into_par_iter().map(normalize_message).collect();

    for record in &records {
        match store.upsert_email(account_id, folder_id, record) {
            Ok(_) => stats.messages_stored += 1,
            Err(e) => {
                log::warn!(
                    "[SYNC] Failed to store uid {} in {}: {:#}",
                    record.uid,
                    remote.path,
                    e
                );
                stats.errors += 1;
            }
        }
    }

    log::info!(
        "[SYNC] Folder {}: {} of {} message(s) stored",
        remote.path,
        stats.messages_stored,
        stats.messages_fetched
    );

    Ok(stats)
}
