//! Operator query parser
//!
//! Turns a one-line query into [`SearchFilters`]:
//! - `account:work` - account name
//! - `in:INBOX` - folder path
//! - `from:alice` - sender address or name
//! - `to:bob@example.com` - recipient
//! - `subject:"quarterly report"` - subject substring
//! - `after:2024-01-01` - on or after that day (also `YYYY/MM/DD` or RFC 3339)
//! - `before:2024-02-01` - strictly before that day
//!
//! Everything else becomes full-text body terms. Unknown operators and
//! operators with an empty value are kept as text.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::SearchFilters;

const OPERATORS: [&str; 7] = ["account", "in", "from", "to", "subject", "after", "before"];

/// Parse an operator query into search filters
pub fn parse_query(input: &str) -> SearchFilters {
    let mut filters = SearchFilters::default();
    let mut terms: Vec<String> = Vec::new();

    for token in tokenize(input) {
        let Some((key, value)) = split_operator(&token) else {
            terms.push(token.strip_quotes());
            continue;
        };

        match key.as_str() {
            "account" => filters.account = Some(value),
            "in" => filters.folder = Some(value),
            "from" => filters.sender = Some(value),
            "to" => filters.recipient = Some(value),
            "subject" => filters.subject = Some(value),
            "after" => match parse_day(&value) {
                Some(date) => filters.date_from = Some(date),
                None => terms.push(token.strip_quotes()),
            },
            "before" => match parse_day(&value) {
                Some(date) => filters.date_to = Some(date - Duration::seconds(1)),
                None => terms.push(token.strip_quotes()),
            },
            _ => terms.push(token.strip_quotes()),
        }
    }

    if !terms.is_empty() {
        filters.body = Some(terms.join(" "));
    }
    filters
}

/// A whitespace-delimited token; quoted spans may contain whitespace
#[derive(Debug, Clone, PartialEq)]
struct Token(String);

impl Token {
    fn strip_quotes(&self) -> String {
        self.0.replace('"', "")
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(Token(std::mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(Token(current));
    }

    tokens
}

/// Split `key:value` when key is a known operator and value is non-empty
fn split_operator(token: &Token) -> Option<(String, String)> {
    let (key, value) = token.0.split_once(':')?;
    let key = key.to_lowercase();
    if !OPERATORS.contains(&key.as_str()) {
        return None;
    }

    let value = value.replace('"', "");
    if value.trim().is_empty() {
        return None;
    }
    Some((key, value))
}

/// Midnight UTC of a `YYYY-MM-DD` / `YYYY/MM/DD` day, or an RFC 3339 instant
fn parse_day(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }

    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_terms_become_body() {
        let filters = parse_query("budget review");
        assert_eq!(filters.body.as_deref(), Some("budget review"));
        assert_eq!(filters.sender, None);
    }

    #[test]
    fn test_operators() {
        let filters = parse_query("account:work in:INBOX from:alice to:bob subject:meeting");
        assert_eq!(filters.account.as_deref(), Some("work"));
        assert_eq!(filters.folder.as_deref(), Some("INBOX"));
        assert_eq!(filters.sender.as_deref(), Some("alice"));
        assert_eq!(filters.recipient.as_deref(), Some("bob"));
        assert_eq!(filters.subject.as_deref(), Some("meeting"));
        assert_eq!(filters.body, None);
    }

    #[test]
    fn test_quoted_values() {
        let filters = parse_query("subject:\"quarterly report\" \"exact phrase\"");
        assert_eq!(filters.subject.as_deref(), Some("quarterly report"));
        assert_eq!(filters.body.as_deref(), Some("exact phrase"));
    }

    #[test]
    fn test_date_operators() {
        let filters = parse_query("after:2024/01/02 before:2024-01-04");
        assert_eq!(
            filters.date_from.unwrap().to_rfc3339(),
            "2024-01-02T00:00:00+00:00"
        );
        assert_eq!(
            filters.date_to.unwrap().to_rfc3339(),
            "2024-01-03T23:59:59+00:00"
        );
    }

    #[test]
    fn test_unknown_or_empty_operator_is_text() {
        let filters = parse_query("foo:bar from: hello");
        assert_eq!(filters.body.as_deref(), Some("foo:bar from: hello"));
        assert_eq!(filters.sender, None);
    }

    #[test]
    fn test_bad_date_is_text() {
        let filters = parse_query("after:soon");
        assert_eq!(filters.date_from, None);
        assert_eq!(filters.body.as_deref(), Some("after:soon"));
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(parse_query("   "), SearchFilters::default());
    }
}
