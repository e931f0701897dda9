//! Checkpoint store trait definition.
//!
//! [`CheckpointStore`] defines the storage contract for stream watermarks
//! and the append-only run log. Model types live in
//! [`scout_types::state`].

use scout_types::state::{Checkpoint, RunLog, StreamId};

use crate::error;

/// Storage contract for sync state.
///
/// One checkpoint row per stream, overwritten in place; run logs are only
/// ever appended.
#[allow(async_fn_in_trait)]
pub trait CheckpointStore {
    /// Read the checkpoint for a stream.
    ///
    /// Returns `Ok(None)` when no checkpoint has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    async fn get_checkpoint(&self, stream: &StreamId) -> error::Result<Option<Checkpoint>>;

    /// Upsert the checkpoint keyed by `checkpoint.stream`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    async fn set_checkpoint(&self, checkpoint: &Checkpoint) -> error::Result<()>;

    /// Append one run-log entry.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    async fn append_run_log(&self, log: &RunLog) -> error::Result<()>;
}
