//! Orchestration crate for the Odoo → Supabase Scout sync.

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod execution;
pub(crate) mod loader;
pub mod orchestrator;
pub mod resolve;
pub mod result;
pub(crate) mod retry;
pub mod transform;

// Re-export public API for convenience
pub use errors::PipelineError;
pub use execution::{ExecutionOptions, SyncPhase};
pub use orchestrator::{run_sync, Orchestrator};
pub use result::SyncOutcome;
