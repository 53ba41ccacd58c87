//! Search over the cache
//!
//! Structured filters (account, folder, sender, recipient, subject, date
//! range) are combined with an optional FTS5 predicate. Queries can also
//! be written with operators like `from:`, `subject:`, `in:`, `after:`.

mod query;
mod query_parser;

pub use query::{EmailQuery, fts_expression};
pub(crate) use query::format_date;
pub use query_parser::parse_query;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_SEARCH_LIMIT;
use crate::error::InvalidInputError;
use crate::storage::MailStore;

/// Characters of body text kept in a snippet
pub const SNIPPET_CHARS: usize = 200;

/// Search filters as received from a caller, with dates still as text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub account: Option<String>,
    pub folder: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    /// RFC 3339 lower bound (inclusive)
    pub date_from: Option<String>,
    /// RFC 3339 upper bound (inclusive)
    pub date_to: Option<String>,
    pub body: Option<String>,
    pub limit: Option<i64>,
}

/// Validated search filters; every present field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Account name
    pub account: Option<String>,
    /// Folder path
    pub folder: Option<String>,
    /// Substring of the sender address or display name
    pub sender: Option<String>,
    /// Substring of any recipient address
    pub recipient: Option<String>,
    /// Substring of the subject
    pub subject: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Full-text terms matched against the shadow index (subject, sender, body)
    pub body: Option<String>,
    /// Result count; zero or negative means the configured default
    pub limit: i64,
}

impl TryFrom<SearchRequest> for SearchFilters {
    type Error = InvalidInputError;

    fn try_from(req: SearchRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            account: non_blank(req.account),
            folder: non_blank(req.folder),
            sender: non_blank(req.sender),
            recipient: non_blank(req.recipient),
            subject: non_blank(req.subject),
            date_from: parse_date_filter("date_from", req.date_from)?,
            date_to: parse_date_filter("date_to", req.date_to)?,
            body: non_blank(req.body),
            limit: req.limit.unwrap_or(0),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date_filter(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, InvalidInputError> {
    match non_blank(value) {
        None => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value.trim())
            .map(|d| Some(d.with_timezone(&Utc)))
            .map_err(|_| InvalidInputError::Date { field, value }),
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSummary {
    /// Cache surrogate id, usable with `get_email`
    pub id: i64,
    pub account_name: String,
    pub folder_path: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub date: DateTime<Utc>,
    /// Start of the plain-text body
    pub snippet: String,
}

/// Clamp a requested result count to `1..=1000`
///
/// Zero or negative requests get `default_limit`.
pub fn clamp_limit(requested: i64, default_limit: i64) -> i64 {
    let limit = if requested <= 0 {
        default_limit
    } else {
        requested
    };
    limit.clamp(1, MAX_SEARCH_LIMIT)
}

/// First [`SNIPPET_CHARS`] characters of a body, with "..." when cut
pub fn make_snippet(body: &str) -> String {
    match body.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Search cached emails, newest first
pub fn search(
    store: &dyn MailStore,
    filters: &SearchFilters,
    default_limit: i64,
) -> Result<Vec<EmailSummary>> {
    let query = EmailQuery::from_filters(filters, default_limit);
    store.query_emails(&query)
}

/// Full-text search over subject, sender and body, newest first
pub fn search_fts(
    store: &dyn MailStore,
    text: &str,
    account: Option<&str>,
    limit: i64,
    default_limit: i64,
) -> Result<Vec<EmailSummary>> {
    let Some(expression) = fts_expression(text) else {
        return Err(InvalidInputError::Missing("query").into());
    };

    let mut query = EmailQuery::new(clamp_limit(limit, default_limit)).full_text(expression);
    if let Some(account) = account.filter(|a| !a.is_empty()) {
        query = query.account(account);
    }
    store.query_emails(&query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0, 100), 100);
        assert_eq!(clamp_limit(-5, 100), 100);
        assert_eq!(clamp_limit(25, 100), 25);
        assert_eq!(clamp_limit(5000, 100), 1000);
        assert_eq!(clamp_limit(0, 0), 1);
    }

    #[test]
    fn test_make_snippet() {
        assert_eq!(make_snippet(""), "");
        assert_eq!(make_snippet("short body"), "short body");

        let exact = "a".repeat(200);
        assert_eq!(make_snippet(&exact), exact);

        let long = "é".repeat(250);
        let snippet = make_snippet(&long);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), 203);
    }

    #[test]
    fn test_request_to_filters() {
        let req = SearchRequest {
            account: Some("work".to_string()),
            folder: Some("".to_string()),
            date_from: Some("2024-01-02T00:00:00Z".to_string()),
            limit: Some(10),
            ..SearchRequest::default()
        };

        let filters = SearchFilters::try_from(req).unwrap();
        assert_eq!(filters.account.as_deref(), Some("work"));
        assert_eq!(filters.folder, None);
        assert_eq!(
            filters.date_from.unwrap().to_rfc3339(),
            "2024-01-02T00:00:00+00:00"
        );
        assert_eq!(filters.limit, 10);
    }

    #[test]
    fn test_bad_date_is_invalid_input() {
        let req = SearchRequest {
            date_to: Some("yesterday".to_string()),
            ..SearchRequest::default()
        };

        let err = SearchFilters::try_from(req).unwrap_err();
        assert_eq!(
            err,
            InvalidInputError::Date {
                field: "date_to",
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn test_request_deserializes_sparse_json() {
        let req: SearchRequest = serde_json::from_str(r#"{"subject": "B"}"#).unwrap();
        assert_eq!(req.subject.as_deref(), Some("B"));
        assert_eq!(req.limit, None);
    }
}
