//! Batched sink writes and derived-layer refresh.

use scout_types::connector::Sink;
use scout_types::error::ConnectorError;
use scout_types::transaction::CanonicalTransaction;

use crate::result::{RefreshOutcome, RefreshStatus};
use crate::retry::with_retry;

/// A batch exhausted its retries. Earlier batches stay committed.
#[derive(Debug)]
pub(crate) struct LoadError {
    pub(crate) loaded: u64,
    pub(crate) batch_index: usize,
    pub(crate) source: ConnectorError,
}

/// Upsert `records` in chunks of `batch_size`. Returns rows written.
pub(crate) async fn load_batches<S: Sink>(
    sink: &S,
    records: &[CanonicalTransaction],
    batch_size: usize,
    max_retries: u32,
) -> Result<u64, LoadError> {
    let mut loaded = 0u64;
    for (batch_index, batch) in records.chunks(batch_size.max(1)).enumerate() {
        match with_retry("upsert_batch", max_retries, || sink.upsert_batch(batch)).await {
            Ok(written) => {
                loaded += written;
                tracing::debug!(batch = batch_index, rows = batch.len(), loaded, "Batch loaded");
            }
            Err(source) => {
                return Err(LoadError {
                    loaded,
                    batch_index,
                    source,
                })
            }
        }
    }
    Ok(loaded)
}

/// Refresh each derived layer in order. Failures are logged, never
/// propagated; layers after a failed one are skipped.
pub(crate) async fn refresh_derived<S: Sink>(sink: &S) -> Vec<RefreshOutcome> {
    let mut outcomes = Vec::new();
    let mut upstream_failed = false;
    for layer in sink.derived_layers() {
        let status = if upstream_failed {
            tracing::warn!(layer = %layer, "Skipping refresh: upstream layer failed");
            RefreshStatus::Skipped
        } else {
            match sink.refresh_layer(&layer).await {
                Ok(()) => {
                    tracing::info!(layer = %layer, "Derived layer refreshed");
                    RefreshStatus::Refreshed
                }
                Err(e) => {
                    tracing::warn!(layer = %layer, error = %e, "Derived layer refresh failed");
                    upstream_failed = true;
                    RefreshStatus::Failed(e.to_string())
                }
            }
        };
        outcomes.push(RefreshOutcome { layer, status });
    }
    outcomes
}
