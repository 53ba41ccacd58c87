//! SQL builder for cache searches
//!
//! Each present filter appends one predicate and binds its values
//! positionally, so user input never becomes part of the SQL text.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;

use super::{SearchFilters, clamp_limit};

const SELECT: &str = "SELECT e.id, a.name, f.path, e.subject, e.sender_name, e.sender_email,
        e.date, substr(e.body_text, 1, 201)
     FROM emails e
     JOIN accounts a ON a.id = e.account_id
     JOIN folders f ON f.id = e.folder_id";

/// A search over cached emails, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct EmailQuery {
    conditions: Vec<String>,
    params: Vec<Value>,
    limit: i64,
}

impl EmailQuery {
    /// An unfiltered query returning at most `limit` rows
    pub fn new(limit: i64) -> Self {
        Self {
            conditions: Vec::new(),
            params: Vec::new(),
            limit,
        }
    }

    /// Translate search filters, clamping the limit
    pub fn from_filters(filters: &SearchFilters, default_limit: i64) -> Self {
        let mut query = Self::new(clamp_limit(filters.limit, default_limit));

        if let Some(account) = &filters.account {
            query = query.account(account);
        }
        if let Some(folder) = &filters.folder {
            query = query.folder(folder);
        }
        if let Some(sender) = &filters.sender {
            let pattern = like_pattern(sender);
            query.push(
                "(e.sender_email LIKE ? ESCAPE '\\' OR e.sender_name LIKE ? ESCAPE '\\')",
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }
        if let Some(recipient) = &filters.recipient {
            query.push(
                "e.recipients LIKE ? ESCAPE '\\'",
                [Value::Text(like_pattern(recipient))],
            );
        }
        if let Some(subject) = &filters.subject {
            query.push(
                "e.subject LIKE ? ESCAPE '\\'",
                [Value::Text(like_pattern(subject))],
            );
        }
        if let Some(from) = filters.date_from {
            query.push("e.date >= ?", [Value::Text(format_date(from))]);
        }
        if let Some(to) = filters.date_to {
            query.push("e.date <= ?", [Value::Text(format_date(to))]);
        }
        if let Some(expression) = filters.body.as_deref().and_then(fts_expression) {
            query = query.full_text(expression);
        }

        query
    }

    /// Restrict to an account by name
    pub fn account(mut self, name: &str) -> Self {
        self.push("a.name = ?", [Value::Text(name.to_string())]);
        self
    }

    /// Restrict to a folder by path
    pub fn folder(mut self, path: &str) -> Self {
        self.push("f.path = ?", [Value::Text(path.to_string())]);
        self
    }

    /// Require a match of an FTS5 expression against the shadow index
    pub fn full_text(mut self, expression: String) -> Self {
        self.push(
            "e.id IN (SELECT rowid FROM emails_fts WHERE emails_fts MATCH ?)",
            [Value::Text(expression)],
        );
        self
    }

    fn push<const N: usize>(&mut self, condition: &str, params: [Value; N]) {
        self.conditions.push(condition.to_string());
        self.params.extend(params);
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// The SQL text with `?` placeholders
    pub fn sql(&self) -> String {
        let mut sql = SELECT.to_string();
        if !self.conditions.is_empty() {
            sql.push_str("\n     WHERE ");
            sql.push_str(&self.conditions.join("\n       AND "));
        }
        sql.push_str("\n     ORDER BY e.date DESC, e.id DESC\n     LIMIT ?");
        sql
    }

    /// Values for the placeholders in [`EmailQuery::sql`], in order
    pub fn bind_values(&self) -> Vec<Value> {
        let mut values = self.params.clone();
        values.push(Value::Integer(self.limit));
        values
    }
}

/// Dates are stored as RFC 3339 UTC text so string order is time order
pub(crate) fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `%value%` with LIKE wildcards in the value escaped
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Quote each whitespace-separated term as an FTS5 string
fn quoted_terms(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect()
}

/// FTS5 expression matching every term in any indexed column
///
/// Returns `None` when the text has no terms.
pub fn fts_expression(text: &str) -> Option<String> {
    let terms = quoted_terms(text);
    (!terms.is_empty()).then(|| terms.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filters() {
        let query = EmailQuery::from_filters(&SearchFilters::default(), 100);
        assert!(!query.sql().contains("WHERE"));
        assert!(query.sql().ends_with("LIMIT ?"));
        assert_eq!(query.bind_values(), vec![Value::Integer(100)]);
    }

    #[test]
    fn test_each_filter_binds_positionally() {
        let filters = SearchFilters {
            account: Some("work".to_string()),
            sender: Some("ada".to_string()),
            subject: Some("50%_off".to_string()),
            date_from: DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z")
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            body: Some("budget".to_string()),
            limit: 5000,
            ..SearchFilters::default()
        };

        let query = EmailQuery::from_filters(&filters, 100);
        let sql = query.sql();
        assert_eq!(sql.matches('?').count(), query.bind_values().len());
        assert!(sql.contains("a.name = ?"));
        assert!(sql.contains("emails_fts MATCH ?"));
        assert_eq!(query.limit(), 1000);

        let values = query.bind_values();
        assert_eq!(values[0], Value::Text("work".to_string()));
        assert_eq!(values[1], Value::Text("%ada%".to_string()));
        assert_eq!(values[3], Value::Text("%50\\%\\_off%".to_string()));
        assert_eq!(values[4], Value::Text("2024-01-02T00:00:00Z".to_string()));
        assert_eq!(values[5], Value::Text("\"budget\"".to_string()));
    }

    #[test]
    fn test_blank_body_adds_no_predicate() {
        let filters = SearchFilters {
            body: Some("   ".to_string()),
            ..SearchFilters::default()
        };
        assert!(!EmailQuery::from_filters(&filters, 10).sql().contains("MATCH"));
    }

    #[test]
    fn test_fts_defuses_operators() {
        assert_eq!(
            fts_expression("say \"hi\" OR NEAR(x"),
            Some("\"say\" AND \"\"\"hi\"\"\" AND \"OR\" AND \"NEAR(x\"".to_string())
        );
        assert_eq!(fts_expression("  "), None);
    }

    #[test]
    fn test_format_date_is_sortable() {
        let date = DateTime::parse_from_rfc3339("2024-01-03T10:20:30+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_date(date), "2024-01-03T08:20:30Z");
    }
}
