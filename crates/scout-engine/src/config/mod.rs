//! Sync configuration: types, parsing (YAML or environment), validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use types::SyncConfig;
