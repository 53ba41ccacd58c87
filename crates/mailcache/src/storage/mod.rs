//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for cached mail.
//! `SqliteMailStore` is the durable implementation; the sync engine, search
//! and repair path only see the `MailStore` trait.

mod sqlite;
mod traits;

pub use sqlite::SqliteMailStore;
pub use traits::MailStore;
