//! Query API for callers
//!
//! Read paths over the cache. `get_email` may reach the remote server to
//! repair a record whose body was never captured.

mod email;

pub use email::{get_email, list_folders};
