//! Error types callers need to tell apart
//!
//! Everything else travels as `anyhow::Error`. These types are carried inside
//! it and recovered with `downcast_ref`.

/// A referenced account, folder, or email does not exist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("account not found: {0}")]
    Account(String),
    #[error("folder not found: {path} (account #{account_id})")]
    Folder { account_id: i64, path: String },
    #[error("email not found: {0}")]
    Email(i64),
}

/// The remote server could not be reached or rejected the credentials
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection to account '{account}' failed: {reason}")]
pub struct ConnectionError {
    pub account: String,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(account: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            account: account.into(),
            reason: reason.to_string(),
        }
    }
}

/// Caller-supplied input was malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInputError {
    #[error("invalid {field} format '{value}': expected RFC 3339 (e.g. 2024-01-02T00:00:00Z)")]
    Date { field: &'static str, value: String },
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Check whether an error (or anything it wraps) is a [`NotFoundError`]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<NotFoundError>().is_some()
}

/// Check whether an error (or anything it wraps) is a [`ConnectionError`]
pub fn is_connection_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConnectionError>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_not_found_survives_context() {
        let result: anyhow::Result<()> =
            Err(NotFoundError::Email(42)).context("Failed to load email");
        let err = result.unwrap_err();
        assert!(is_not_found(&err));
        assert!(!is_connection_error(&err));
        assert_eq!(
            err.downcast_ref::<NotFoundError>(),
            Some(&NotFoundError::Email(42))
        );
    }

    #[test]
    fn test_connection_error_message() {
        let err = anyhow::Error::new(ConnectionError::new("work", "login rejected"));
        assert!(is_connection_error(&err));
        assert_eq!(
            err.to_string(),
            "connection to account 'work' failed: login rejected"
        );
    }
}
