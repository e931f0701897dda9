//! Odoo source reader.
//!
//! Talks to Odoo's JSON-RPC endpoint (`common.authenticate`,
//! `object.execute_kw` / `search_read`) and decodes point-of-sale orders,
//! order lines, payments, products, and partners into typed records.

pub mod client;
pub mod config;
pub(crate) mod decode;
pub mod query;
pub mod source;

pub use client::OdooClient;
pub use config::Config;
pub use source::OdooSource;
