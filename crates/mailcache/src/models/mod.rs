//! Domain models for cached mail entities

mod account;
mod email;
mod folder;

pub use account::Account;
pub use email::{Email, EmailAddress, EmailRecord, EmailRecordBuilder};
pub use folder::Folder;
