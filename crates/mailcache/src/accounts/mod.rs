//! Account session management

mod registry;

pub use registry::{AccountHandle, AccountRegistry};
