//! Concrete connector and state backend construction.

use dest_supabase::{SupabaseSink, SupabaseStateStore};
use scout_state::error::Result as StateResult;
use scout_state::{CheckpointStore, SqliteCheckpointStore};
use scout_types::state::{Checkpoint, RunLog, StreamId};
use source_odoo::OdooSource;

use crate::config::types::{StateBackendKind, SyncConfig};
use crate::errors::PipelineError;
use crate::orchestrator::{Orchestrator, SyncSettings};

/// State backend selected by `state.backend`.
pub enum AnyStateStore {
    Supabase(SupabaseStateStore),
    Sqlite(SqliteCheckpointStore),
}

impl CheckpointStore for AnyStateStore {
    async fn get_checkpoint(&self, stream: &StreamId) -> StateResult<Option<Checkpoint>> {
        match self {
            Self::Supabase(store) => store.get_checkpoint(stream).await,
            Self::Sqlite(store) => store.get_checkpoint(stream).await,
        }
    }

    async fn set_checkpoint(&self, checkpoint: &Checkpoint) -> StateResult<()> {
        match self {
            Self::Supabase(store) => store.set_checkpoint(checkpoint).await,
            Self::Sqlite(store) => store.set_checkpoint(checkpoint).await,
        }
    }

    async fn append_run_log(&self, log: &RunLog) -> StateResult<()> {
        match self {
            Self::Supabase(store) => store.append_run_log(log).await,
            Self::Sqlite(store) => store.append_run_log(log).await,
        }
    }
}

/// Open the configured state backend.
///
/// # Errors
///
/// Returns a `PipelineError` if the backend cannot be opened.
pub fn create_state_store(config: &SyncConfig) -> Result<AnyStateStore, PipelineError> {
    match config.state.backend {
        StateBackendKind::Supabase => {
            Ok(AnyStateStore::Supabase(SupabaseStateStore::new(&config.sink)?))
        }
        StateBackendKind::Sqlite => {
            let path = config.state.path.as_deref().ok_or_else(|| {
                PipelineError::Config("state.backend 'sqlite' requires state.path".into())
            })?;
            let store = SqliteCheckpointStore::open(path)?;
            tracing::debug!(path = %path.display(), "Opened SQLite state store");
            Ok(AnyStateStore::Sqlite(store))
        }
    }
}

/// Orchestrator wired to Odoo, Supabase, and the configured state backend.
pub type ProductionOrchestrator = Orchestrator<OdooSource, SupabaseSink, AnyStateStore>;

/// Build every collaborator from config.
///
/// # Errors
///
/// Returns a `PipelineError` if any connector rejects its config or the
/// state backend cannot be opened.
pub fn build_orchestrator(config: &SyncConfig) -> Result<ProductionOrchestrator, PipelineError> {
    let source = OdooSource::new(&config.source)?;
    let sink = SupabaseSink::new(&config.sink)?;
    let store = create_state_store(config)?;
    Ok(Orchestrator::new(
        source,
        sink,
        store,
        SyncSettings::from_config(config),
    ))
}
