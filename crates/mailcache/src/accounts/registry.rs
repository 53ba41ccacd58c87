//! Registry of per-account sessions
//!
//! The registry owns every session's lifetime. Sessions are opened on first
//! use, reused afterwards, and dropped after a connection error so the next
//! call reconnects.

use anyhow::Result;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::config::AccountConfig;
use crate::error::{NotFoundError, is_connection_error};
use crate::remote::{MailSession, SessionConnector};

/// One account's configuration and (lazily opened) session
pub struct AccountHandle {
    config: AccountConfig,
    connector: Arc<dyn SessionConnector>,
    session: Option<Box<dyn MailSession>>,
}

impl AccountHandle {
    fn new(config: AccountConfig, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            config,
            connector,
            session: None,
        }
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Run an operation against this account's session, connecting first if needed
    ///
    /// A connection error from either the connect or the operation drops the
    /// session, so the next call starts a fresh one.
    pub fn run<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MailSession) -> Result<T>,
    {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                log::debug!("Opening session for account {}", self.config.name);
                self.connector.connect(&self.config)?
            }
        };
        let session = self.session.insert(session);

        let result = op(session.as_mut());
        if let Err(e) = &result
            && is_connection_error(e)
        {
            log::warn!(
                "Dropping session for account {} after connection error: {:#}",
                self.config.name,
                e
            );
            self.session = None;
        }
        result
    }

    /// Log out and forget the session, if any
    fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(mut session) => session.logout(),
            None => Ok(()),
        }
    }
}

/// Session handles keyed by account name
pub struct AccountRegistry {
    connector: Arc<dyn SessionConnector>,
    accounts: HashMap<String, AccountHandle>,
}

impl AccountRegistry {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            accounts: HashMap::new(),
        }
    }

    /// Create a registry with every account of a configuration registered
    pub fn with_accounts(
        connector: Arc<dyn SessionConnector>,
        accounts: impl IntoIterator<Item = AccountConfig>,
    ) -> Self {
        let mut registry = Self::new(connector);
        for account in accounts {
            registry.register(account);
        }
        registry
    }

    /// Register an account, replacing any earlier registration of the same name
    ///
    /// No connection is made here. A replaced handle's open session is logged
    /// out.
    pub fn register(&mut self, config: AccountConfig) -> &mut AccountHandle {
        let handle = AccountHandle::new(config, Arc::clone(&self.connector));

        match self.accounts.entry(handle.name().to_string()) {
            Entry::Occupied(mut entry) => {
                let mut old = entry.insert(handle);
                if let Err(e) = old.close() {
                    log::warn!("Failed to close replaced session for {}: {:#}", old.name(), e);
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(handle),
        }
    }

    /// Look up an account's handle by name
    pub fn get(&mut self, name: &str) -> Result<&mut AccountHandle> {
        self.accounts
            .get_mut(name)
            .ok_or_else(|| NotFoundError::Account(name.to_string()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }

    /// Registered account names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.accounts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Log out of every open session
    ///
    /// Failures are logged and do not stop the remaining accounts from being
    /// closed. Calling this again is a no-op.
    pub fn close_all(&mut self) {
        for (name, handle) in self.accounts.iter_mut() {
            if !handle.is_connected() {
                continue;
            }
            match handle.close() {
                Ok(()) => log::info!("Closed session for account {}", name),
                Err(e) => log::warn!("Failed to close session for account {}: {:#}", name, e),
            }
        }
    }
}

impl Drop for AccountRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
