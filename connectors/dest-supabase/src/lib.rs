//! Supabase destination.
//!
//! Writes canonical transactions to the bronze table through PostgREST,
//! triggers the silver/gold refresh functions, and keeps checkpoints and
//! run logs in the same database.

pub mod client;
pub mod config;
pub mod sink;
pub mod state;

pub use client::PostgrestClient;
pub use config::Config;
pub use sink::SupabaseSink;
pub use state::SupabaseStateStore;
