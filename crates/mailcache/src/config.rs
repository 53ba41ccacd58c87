//! Configuration loading for the mail cache
//!
//! Supports loading account configuration from (in order of priority):
//! 1. An explicit JSON file path
//! 2. `accounts.json` in the mailcache config directory
//! 3. Environment variables (`IMAP_HOST`, ... or `ACCOUNT_<n>_IMAP_HOST`, ...)

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Config filename in the mailcache config directory
const ACCOUNTS_FILE: &str = "accounts.json";

/// Default cache database filename
const CACHE_FILE: &str = "email_cache.db";

/// Largest result count a search may return
pub const MAX_SEARCH_LIMIT: i64 = 1000;

/// Connection parameters for one remote mailbox account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Unique, user-chosen account name
    pub name: String,
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    pub imap_username: String,
    #[serde(default, skip_serializing)]
    pub imap_password: String,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: String,
    #[serde(default, skip_serializing)]
    pub smtp_password: String,
}

impl AccountConfig {
    /// Create an account using the same username for IMAP and SMTP
    pub fn new(
        name: impl Into<String>,
        imap_host: impl Into<String>,
        smtp_host: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            name: name.into(),
            imap_host: imap_host.into(),
            imap_port: default_imap_port(),
            imap_username: username.clone(),
            imap_password: String::new(),
            smtp_host: smtp_host.into(),
            smtp_port: default_smtp_port(),
            smtp_username: username,
            smtp_password: String::new(),
        }
    }

    /// Set the same password for IMAP and SMTP
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.imap_password = password.clone();
        self.smtp_password = password;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("account name must not be empty");
        }
        if self.imap_host.is_empty() {
            bail!("account {}: imap_host is required", self.name);
        }
        if self.smtp_host.is_empty() {
            bail!("account {}: smtp_host is required", self.name);
        }
        if self.imap_port == 0 {
            bail!("account {}: invalid imap_port", self.name);
        }
        if self.smtp_port == 0 {
            bail!("account {}: invalid smtp_port", self.name);
        }
        Ok(())
    }
}

fn default_imap_port() -> u16 {
    993
}

fn default_smtp_port() -> u16 {
    587
}

fn default_cache_path() -> PathBuf {
    config::config_path(CACHE_FILE).unwrap_or_else(|| PathBuf::from(CACHE_FILE))
}

fn default_search_result_limit() -> i64 {
    100
}

fn default_sync_window() -> u32 {
    100
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    /// Path to the SQLite cache database
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Result count used when a search does not ask for a positive limit
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: i64,
    /// Number of most recent messages fetched per folder sync
    #[serde(default = "default_sync_window")]
    pub sync_window: u32,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            search_result_limit: default_search_result_limit(),
            sync_window: default_sync_window(),
            accounts: Vec::new(),
        }
    }
}

impl MailConfig {
    /// Load configuration using the following priority:
    /// 1. `path` if given
    /// 2. ~/.config/mailcache/accounts.json
    /// 3. Environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = if let Some(path) = path {
            Self::from_file(path)?
        } else if config::config_exists(ACCOUNTS_FILE) {
            config::load_json(ACCOUNTS_FILE)?
        } else {
            Self::from_env()?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse mail config JSON")
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Load configuration from a variable lookup function
    ///
    /// A single account is read from `IMAP_HOST`, `SMTP_HOST`, ... when both
    /// hosts are set; otherwise numbered accounts `ACCOUNT_1_*`,
    /// `ACCOUNT_2_*`, ... are read until the first missing `NAME`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(path) = lookup("CACHE_PATH") {
            cfg.cache_path = PathBuf::from(path);
        }
        if let Some(limit) = lookup("SEARCH_RESULT_LIMIT") {
            cfg.search_result_limit = limit
                .parse()
                .with_context(|| format!("SEARCH_RESULT_LIMIT is not a number: {}", limit))?;
        }
        if let Some(window) = lookup("SYNC_WINDOW") {
            cfg.sync_window = window
                .parse()
                .with_context(|| format!("SYNC_WINDOW is not a number: {}", window))?;
        }

        if lookup("IMAP_HOST").is_some() && lookup("SMTP_HOST").is_some() {
            let name = lookup("ACCOUNT_NAME").unwrap_or_else(|| "default".to_string());
            cfg.accounts.push(account_from_lookup(&lookup, "", name)?);
            return Ok(cfg);
        }

        for num in 1.. {
            let prefix = format!("ACCOUNT_{}_", num);
            let Some(name) = lookup(&format!("{}NAME", prefix)) else {
                break;
            };
            cfg.accounts.push(account_from_lookup(&lookup, &prefix, name)?);
        }

        if cfg.accounts.is_empty() {
            bail!("no email accounts configured");
        }

        Ok(cfg)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_path.as_os_str().is_empty() {
            bail!("cache_path is required");
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.search_result_limit) {
            bail!("search_result_limit must be between 1 and {}", MAX_SEARCH_LIMIT);
        }
        if self.sync_window == 0 {
            bail!("sync_window must be at least 1");
        }
        if self.accounts.is_empty() {
            bail!("at least one account must be configured");
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !seen.insert(account.name.as_str()) {
                bail!("duplicate account name: {}", account.name);
            }
        }

        Ok(())
    }

    /// Find an account by name
    pub fn get_account_by_name(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// The account named "default", or the first configured account
    pub fn default_account(&self) -> Option<&AccountConfig> {
        self.get_account_by_name("default")
            .or_else(|| self.accounts.first())
    }
}

fn account_from_lookup<F>(lookup: &F, prefix: &str, name: String) -> Result<AccountConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(&format!("{}{}", prefix, key));
    let port = |key: &str, default: u16| -> Result<u16> {
        match var(key) {
            Some(value) => value
                .parse()
                .with_context(|| format!("{}{} is not a valid port: {}", prefix, key, value)),
            None => Ok(default),
        }
    };
    let required = |key: &str| {
        var(key).with_context(|| format!("account {}: {}{} is required", name, prefix, key))
    };

    Ok(AccountConfig {
        imap_host: required("IMAP_HOST")?,
        imap_port: port("IMAP_PORT", default_imap_port())?,
        imap_username: required("IMAP_USERNAME")?,
        imap_password: required("IMAP_PASSWORD")?,
        smtp_host: required("SMTP_HOST")?,
        smtp_port: port("SMTP_PORT", default_smtp_port())?,
        smtp_username: required("SMTP_USERNAME")?,
        smtp_password: required("SMTP_PASSWORD")?,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "cache_path": "/tmp/cache.db",
            "accounts": [{
                "name": "work",
                "imap_host": "imap.example.com",
                "imap_username": "me@example.com",
                "imap_password": "secret",
                "smtp_host": "smtp.example.com",
                "smtp_port": 465,
                "smtp_username": "me@example.com",
                "smtp_password": "secret"
            }]
        }"#;

        let cfg = MailConfig::from_json(json).unwrap();
        assert_eq!(cfg.cache_path, PathBuf::from("/tmp/cache.db"));
        assert_eq!(cfg.search_result_limit, 100);
        assert_eq!(cfg.sync_window, 100);
        assert_eq!(cfg.accounts[0].imap_port, 993);
        assert_eq!(cfg.accounts[0].smtp_port, 465);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_passwords_not_serialized() {
        let account = AccountConfig::new("work", "imap.example.com", "smtp.example.com", "me")
            .with_password("hunter2");
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_single_account_from_env() {
        let lookup = lookup_from(&[
            ("IMAP_HOST", "imap.example.com"),
            ("IMAP_USERNAME", "me"),
            ("IMAP_PASSWORD", "pw"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "me"),
            ("SMTP_PASSWORD", "pw"),
            ("SEARCH_RESULT_LIMIT", "50"),
        ]);

        let cfg = MailConfig::from_lookup(lookup).unwrap();
        assert_eq!(cfg.accounts.len(), 1);
        assert_eq!(cfg.accounts[0].name, "default");
        assert_eq!(cfg.accounts[0].imap_port, 993);
        assert_eq!(cfg.accounts[0].smtp_port, 2525);
        assert_eq!(cfg.search_result_limit, 50);
    }

    #[test]
    fn test_numbered_accounts_from_env() {
        let mut pairs = Vec::new();
        for (n, name) in [(1, "work"), (2, "home")] {
            for (key, value) in [
                ("NAME", name),
                ("IMAP_HOST", "imap.example.com"),
                ("IMAP_USERNAME", "me"),
                ("IMAP_PASSWORD", "pw"),
                ("SMTP_HOST", "smtp.example.com"),
                ("SMTP_USERNAME", "me"),
                ("SMTP_PASSWORD", "pw"),
            ] {
                pairs.push((format!("ACCOUNT_{}_{}", n, key), value.to_string()));
            }
        }
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let cfg = MailConfig::from_lookup(lookup_from(&borrowed)).unwrap();
        let names: Vec<&str> = cfg.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["work", "home"]);
        assert_eq!(cfg.default_account().unwrap().name, "work");
    }

    #[test]
    fn test_missing_password_is_error() {
        let lookup = lookup_from(&[
            ("IMAP_HOST", "imap.example.com"),
            ("IMAP_USERNAME", "me"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "me"),
            ("SMTP_PASSWORD", "pw"),
        ]);
        assert!(MailConfig::from_lookup(lookup).is_err());
    }

    #[test]
    fn test_no_accounts_is_error() {
        assert!(MailConfig::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_limit() {
        let account = AccountConfig::new("work", "imap.example.com", "smtp.example.com", "me");
        let mut cfg = MailConfig {
            accounts: vec![account.clone(), account],
            ..MailConfig::default()
        };
        assert!(cfg.validate().is_err());

        cfg.accounts.pop();
        assert!(cfg.validate().is_ok());

        cfg.search_result_limit = 5000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_account_prefers_named_default() {
        let cfg = MailConfig {
            accounts: vec![
                AccountConfig::new("work", "imap.a", "smtp.a", "me"),
                AccountConfig::new("default", "imap.b", "smtp.b", "me"),
            ],
            ..MailConfig::default()
        };
        assert_eq!(cfg.default_account().unwrap().name, "default");
        assert!(cfg.get_account_by_name("missing").is_none());
    }
}
