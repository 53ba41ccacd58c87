//! SQLite-based mail cache with an FTS5 shadow index

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rusqlite_migration::{M, Migrations};

use super::traits::MailStore;
use crate::error::NotFoundError;
use crate::models::{Account, Email, EmailRecord, Folder};
use crate::search::{EmailQuery, EmailSummary, make_snippet};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                imap_host TEXT NOT NULL,
                imap_port INTEGER NOT NULL,
                imap_username TEXT NOT NULL,
                smtp_host TEXT NOT NULL,
                smtp_port INTEGER NOT NULL,
                smtp_username TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE folders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                last_synced TEXT,
                UNIQUE (account_id, path),
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            -- recipients, headers and flags are JSON
            CREATE TABLE emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                folder_id INTEGER NOT NULL,
                uid INTEGER NOT NULL,
                message_id TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                sender_name TEXT NOT NULL DEFAULT '',
                sender_email TEXT NOT NULL DEFAULT '',
                recipients TEXT NOT NULL DEFAULT '[]',
                date TEXT NOT NULL,
                body_text TEXT NOT NULL DEFAULT '',
                body_html TEXT NOT NULL DEFAULT '',
                headers TEXT NOT NULL DEFAULT '{}',
                flags TEXT NOT NULL DEFAULT '[]',
                cached_at TEXT NOT NULL,
                UNIQUE (account_id, folder_id, uid),
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
                FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_emails_date ON emails(date DESC);
            CREATE INDEX idx_emails_folder ON emails(folder_id);
            CREATE INDEX idx_emails_sender ON emails(sender_email);
            CREATE INDEX idx_emails_message_id ON emails(message_id);

            -- Full-text shadow of emails, kept in step by the triggers below
            CREATE VIRTUAL TABLE emails_fts USING fts5(
                subject,
                sender_email,
                sender_name,
                body_text,
                content='emails',
                content_rowid='id'
            );

            CREATE TRIGGER emails_fts_insert AFTER INSERT ON emails BEGIN
                INSERT INTO emails_fts(rowid, subject, sender_email, sender_name, body_text)
                VALUES (new.id, new.subject, new.sender_email, new.sender_name, new.body_text);
            END;

            CREATE TRIGGER emails_fts_delete AFTER DELETE ON emails BEGIN
                INSERT INTO emails_fts(emails_fts, rowid, subject, sender_email, sender_name, body_text)
                VALUES ('delete', old.id, old.subject, old.sender_email, old.sender_name, old.body_text);
            END;

            CREATE TRIGGER emails_fts_update AFTER UPDATE ON emails BEGIN
                INSERT INTO emails_fts(emails_fts, rowid, subject, sender_email, sender_name, body_text)
                VALUES ('delete', old.id, old.subject, old.sender_email, old.sender_name, old.body_text);
                INSERT INTO emails_fts(rowid, subject, sender_email, sender_name, body_text)
                VALUES (new.id, new.subject, new.sender_email, new.sender_name, new.body_text);
            END;
            "#,
        ),
    ])
}

const EMAIL_COLUMNS: &str = "e.id, e.account_id, a.name, e.folder_id, f.path, e.uid,
    e.message_id, e.subject, e.sender_name, e.sender_email, e.recipients, e.date,
    e.body_text, e.body_html, e.headers, e.flags, e.cached_at";

/// SQLite-based mail cache
///
/// A single connection guarded by a mutex; every email write runs in a
/// transaction so the FTS triggers commit together with the row.
pub struct SqliteMailStore {
    conn: Mutex<Connection>,
}

impl SqliteMailStore {
    /// Open (or create) the cache database at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL lets readers proceed during sync writes; NORMAL is safe with WAL.
        // foreign_keys is required for ON DELETE CASCADE.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// Open a private in-memory cache
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn email_from_row(row: &Row<'_>) -> rusqlite::Result<Email> {
        let uid: i64 = row.get(5)?;
        let recipients: String = row.get(10)?;
        let date: String = row.get(11)?;
        let headers: String = row.get(14)?;
        let flags: String = row.get(15)?;
        let cached_at: String = row.get(16)?;

        Ok(Email {
            id: row.get(0)?,
            account_id: row.get(1)?,
            account_name: row.get(2)?,
            folder_id: row.get(3)?,
            folder_path: row.get(4)?,
            uid: uid as u32,
            message_id: row.get(6)?,
            subject: row.get(7)?,
            sender_name: row.get(8)?,
            sender_email: row.get(9)?,
            recipients: from_json(10, &recipients)?,
            date: parse_timestamp(&date),
            body_text: row.get(12)?,
            body_html: row.get(13)?,
            headers: from_json::<HashMap<String, String>>(14, &headers)?,
            flags: from_json(15, &flags)?,
            cached_at: parse_timestamp(&cached_at),
        })
    }

    fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<EmailSummary> {
        let date: String = row.get(6)?;
        let body_start: String = row.get(7)?;

        Ok(EmailSummary {
            id: row.get(0)?,
            account_name: row.get(1)?,
            folder_path: row.get(2)?,
            subject: row.get(3)?,
            sender_name: row.get(4)?,
            sender_email: row.get(5)?,
            date: parse_timestamp(&date),
            snippet: make_snippet(&body_start),
        })
    }
}

impl MailStore for SqliteMailStore {
    fn upsert_account(&self, account: &Account) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = timestamp(Utc::now());

        // ON CONFLICT DO UPDATE keeps the row (and its cascading children);
        // INSERT OR REPLACE would delete and re-create it.
        let id = conn
            .query_row(
                "INSERT INTO accounts
                 (name, imap_host, imap_port, imap_username,
                  smtp_host, smtp_port, smtp_username, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(name) DO UPDATE SET
                    imap_host = excluded.imap_host,
                    imap_port = excluded.imap_port,
                    imap_username = excluded.imap_username,
                    smtp_host = excluded.smtp_host,
                    smtp_port = excluded.smtp_port,
                    smtp_username = excluded.smtp_username,
                    updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    account.name,
                    account.imap_host,
                    account.imap_port,
                    account.imap_username,
                    account.smtp_host,
                    account.smtp_port,
                    account.smtp_username,
                    timestamp(account.created_at),
                    now,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert account {}", account.name))?;

        Ok(id)
    }

    fn get_account_id_by_name(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row("SELECT id FROM accounts WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;

        id.ok_or_else(|| NotFoundError::Account(name.to_string()).into())
    }

    fn delete_account(&self, name: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id: Option<i64> = tx
            .query_row("SELECT id FROM accounts WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(id) = id else {
            return Err(NotFoundError::Account(name.to_string()).into());
        };

        // Delete emails explicitly so the FTS delete trigger fires for each row
        tx.execute("DELETE FROM emails WHERE account_id = ?", [id])?;
        tx.execute("DELETE FROM accounts WHERE id = ?", [id])?;
        tx.commit()?;

        Ok(())
    }

    fn upsert_folder(
        &self,
        account_id: i64,
        name: &str,
        path: &str,
        message_count: u32,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();

        let id = conn
            .query_row(
                "INSERT INTO folders (account_id, name, path, message_count, last_synced)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(account_id, path) DO UPDATE SET
                    name = excluded.name,
                    message_count = excluded.message_count,
                    last_synced = excluded.last_synced
                 RETURNING id",
                params![account_id, name, path, message_count, timestamp(Utc::now())],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert folder {}", path))?;

        Ok(id)
    }

    fn get_folder_id(&self, account_id: i64, path: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM folders WHERE account_id = ? AND path = ?",
                params![account_id, path],
                |row| row.get(0),
            )
            .optional()?;

        id.ok_or_else(|| {
            NotFoundError::Folder {
                account_id,
                path: path.to_string(),
            }
            .into()
        })
    }

    fn list_folders(&self, account_id: Option<i64>) -> Result<Vec<Folder>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT f.id, f.account_id, a.name, f.name, f.path, f.message_count, f.last_synced
             FROM folders f
             JOIN accounts a ON a.id = f.account_id
             WHERE ?1 IS NULL OR f.account_id = ?1
             ORDER BY a.name, f.path",
        )?;

        let folders = stmt
            .query_map([account_id], |row| {
                let last_synced: Option<String> = row.get(6)?;
                Ok(Folder {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    account_name: row.get(2)?,
                    name: row.get(3)?,
                    path: row.get(4)?,
                    message_count: row.get(5)?,
                    last_synced: last_synced.as_deref().map(parse_timestamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(folders)
    }

    fn upsert_email(&self, account_id: i64, folder_id: i64, record: &EmailRecord) -> Result<i64> {
        let recipients = serde_json::to_string(&record.recipients)?;
        let headers = serde_json::to_string(&record.headers)?;
        let flags = serde_json::to_string(&record.flags)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id = tx
            .query_row(
                "INSERT INTO emails
                 (account_id, folder_id, uid, message_id, subject, sender_name, sender_email,
                  recipients, date, body_text, body_html, headers, flags, cached_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(account_id, folder_id, uid) DO UPDATE SET
                    message_id = excluded.message_id,
                    subject = excluded.subject,
                    sender_name = excluded.sender_name,
                    sender_email = excluded.sender_email,
                    recipients = excluded.recipients,
                    date = excluded.date,
                    body_text = excluded.body_text,
                    body_html = excluded.body_html,
                    headers = excluded.headers,
                    flags = excluded.flags,
                    cached_at = excluded.cached_at
                 RETURNING id",
                params![
                    account_id,
                    folder_id,
                    record.uid,
                    record.message_id,
                    record.subject,
                    record.sender.name_or_empty(),
                    record.sender.email,
                    recipients,
                    timestamp(record.date),
                    record.body_text,
                    record.body_html,
                    headers,
                    flags,
                    timestamp(Utc::now()),
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert email uid {}", record.uid))?;

        tx.commit()?;
        Ok(id)
    }

    fn get_email_by_id(&self, id: i64) -> Result<Email> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {}
             FROM emails e
             JOIN accounts a ON a.id = e.account_id
             JOIN folders f ON f.id = e.folder_id
             WHERE e.id = ?",
            EMAIL_COLUMNS
        );

        let email = conn
            .query_row(&sql, [id], Self::email_from_row)
            .optional()
            .with_context(|| format!("Failed to load email {}", id))?;

        email.ok_or_else(|| NotFoundError::Email(id).into())
    }

    fn has_emails(&self, account_id: Option<i64>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM emails WHERE ?1 IS NULL OR account_id = ?1)",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn query_emails(&self, query: &EmailQuery) -> Result<Vec<EmailSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&query.sql())
            .context("Failed to prepare search query")?;

        let summaries = stmt
            .query_map(params_from_iter(query.bind_values()), Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to run search query")?;

        Ok(summaries)
    }
}

fn timestamp(date: DateTime<Utc>) -> String {
    crate::search::format_date(date)
}

/// Parse a stored timestamp
///
/// Accepts RFC 3339 and SQLite's `YYYY-MM-DD HH:MM:SS`; anything else maps to
/// the Unix epoch rather than failing the read.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return date.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn from_json<T: serde::de::DeserializeOwned>(column: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
