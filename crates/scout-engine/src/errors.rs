//! Pipeline error model and retry backoff policy helpers.

use std::time::Duration;

use scout_state::StateError;
use scout_types::error::{BackoffClass, ConnectorError};

const BACKOFF_FAST_BASE_MS: u64 = 100;
const BACKOFF_NORMAL_BASE_MS: u64 = 1_000;
const BACKOFF_SLOW_BASE_MS: u64 = 5_000;
const BACKOFF_MAX_MS: u64 = 60_000;

/// Categorized pipeline error for retry decisions.
///
/// `Connector` wraps a typed [`ConnectorError`] with retry metadata.
/// `State` wraps checkpoint store failures, which are fatal for the run.
/// `Infrastructure` wraps opaque host-side errors that are never retryable.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
    /// Typed connector error with retry metadata.
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    /// Checkpoint store failure.
    #[error(transparent)]
    State(#[from] StateError),
    /// Infrastructure error (client construction, task join, etc.)
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    /// Returns `true` if retrying the failed call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connector(e) => e.retryable,
            Self::State(e) => e.is_retryable(),
            Self::Config(_) | Self::Infrastructure(_) => false,
        }
    }

    /// Returns the typed connector error if this is a `Connector` variant.
    #[must_use]
    pub fn as_connector_error(&self) -> Option<&ConnectorError> {
        match self {
            Self::Connector(e) => Some(e),
            Self::State(StateError::Remote(e)) => Some(e),
            _ => None,
        }
    }
}

/// Compute retry delay based on error hints and attempt number.
pub(crate) fn compute_backoff(err: &ConnectorError, attempt: u32) -> Duration {
    // Server-supplied delay wins
    if let Some(ms) = err.retry_after_ms {
        return Duration::from_millis(ms.min(BACKOFF_MAX_MS));
    }

    let base_ms: u64 = match err.backoff_class {
        BackoffClass::Fast => BACKOFF_FAST_BASE_MS,
        BackoffClass::Normal => BACKOFF_NORMAL_BASE_MS,
        BackoffClass::Slow => BACKOFF_SLOW_BASE_MS,
    };

    let exponent = attempt.saturating_sub(1).min(16);
    let delay_ms = base_ms.saturating_mul(2u64.pow(exponent));
    Duration::from_millis(delay_ms.min(BACKOFF_MAX_MS))
}
