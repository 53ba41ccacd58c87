//! Service facade over cache, search, sync and sessions
//!
//! `MailService` owns the store and the account registry. Operations that may
//! touch a remote session take `&mut self`.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::accounts::AccountRegistry;
use crate::config::MailConfig;
use crate::error::is_not_found;
use crate::models::{Email, Folder};
use crate::query;
use crate::remote::api::ComposedMessage;
use crate::remote::{ImapConnector, SessionConnector};
use crate::search::{self, EmailSummary, SearchFilters, SearchRequest, parse_query};
use crate::storage::{MailStore, SqliteMailStore};
use crate::sync::{self, SyncOptions, SyncReport};

pub struct MailService {
    config: MailConfig,
    store: Box<dyn MailStore>,
    registry: AccountRegistry,
}

impl MailService {
    /// Open the cache at `config.cache_path` with IMAP sessions
    pub fn open(config: MailConfig) -> Result<Self> {
        if let Some(parent) = config.cache_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }

        let store = SqliteMailStore::open(&config.cache_path)?;
        log::info!("Opened mail cache at {:?}", config.cache_path);

        Ok(Self::new(config, Box::new(store), Arc::new(ImapConnector::new())))
    }

    /// Build a service from an existing store and session connector
    pub fn new(
        config: MailConfig,
        store: Box<dyn MailStore>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let registry = AccountRegistry::with_accounts(connector, config.accounts.iter().cloned());
        Self {
            config,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn MailStore {
        self.store.as_ref()
    }

    pub fn registry(&mut self) -> &mut AccountRegistry {
        &mut self.registry
    }

    /// Sync one folder, or all folders, of a configured account
    pub fn sync_account(&mut self, account: &str, folder: Option<&str>) -> Result<SyncReport> {
        let options = SyncOptions {
            window: self.config.sync_window,
        };
        sync::sync_account(
            &mut self.registry,
            self.store.as_ref(),
            account,
            folder,
            &options,
        )
    }

    /// Search with filters given as text; dates must be RFC 3339
    pub fn search(&self, request: SearchRequest) -> Result<Vec<EmailSummary>> {
        let filters = SearchFilters::try_from(request)?;
        self.search_filters(&filters)
    }

    /// Search with an operator query such as `from:alice after:2024-01-01 report`
    pub fn search_query(&self, query: &str, limit: i64) -> Result<Vec<EmailSummary>> {
        let filters = SearchFilters {
            limit,
            ..parse_query(query)
        };
        self.search_filters(&filters)
    }

    pub fn search_filters(&self, filters: &SearchFilters) -> Result<Vec<EmailSummary>> {
        search::search(
            self.store.as_ref(),
            filters,
            self.config.search_result_limit,
        )
    }

    /// Full-text search over subject, sender and body
    pub fn search_fts(
        &self,
        query: &str,
        account: Option<&str>,
        limit: i64,
    ) -> Result<Vec<EmailSummary>> {
        search::search_fts(
            self.store.as_ref(),
            query,
            account,
            limit,
            self.config.search_result_limit,
        )
    }

    /// Get a cached email, repairing a missing body from the server
    pub fn get_email(&mut self, id: i64) -> Result<Email> {
        query::get_email(self.store.as_ref(), &mut self.registry, id)
    }

    /// List cached folders, optionally for one account
    ///
    /// A configured account with nothing cached yet is synced first so the
    /// listing reflects the server. A failed sync is logged and the cached
    /// listing is still returned.
    pub fn list_folders(&mut self, account: Option<&str>) -> Result<Vec<Folder>> {
        if let Some(name) = account
            && self.registry.contains(name)
            && !self.has_cached_mail(name)?
        {
            log::info!("Account {} has no cached mail, syncing before listing", name);
            if let Err(e) = self.sync_account(name, None) {
                log::warn!("Initial sync of {} failed: {:#}", name, e);
            }
        }

        query::list_folders(self.store.as_ref(), account)
    }

    fn has_cached_mail(&self, account: &str) -> Result<bool> {
        match self.store.get_account_id_by_name(account) {
            Ok(id) => self.store.has_emails(Some(id)),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Send a message through an account's SMTP server
    pub fn send_email(&mut self, account: &str, message: &ComposedMessage) -> Result<()> {
        let handle = self.registry.get(account)?;
        handle.run(|session| session.send_message(message))?;
        log::info!(
            "Sent message from {} to {} recipient(s)",
            account,
            message.to.len() + message.cc.len() + message.bcc.len()
        );
        Ok(())
    }

    /// Remove an account and everything cached for it
    pub fn delete_account(&mut self, account: &str) -> Result<()> {
        self.store.delete_account(account)
    }

    /// Log out of every open session
    pub fn close(&mut self) {
        self.registry.close_all();
    }
}
