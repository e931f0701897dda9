//! Checkpoint and run-log model types.
//!
//! Pure data types shared by `CheckpointStore` implementations and the
//! orchestrator, kept here so the state crate and the connectors can use
//! them without depending on each other.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of one sync job (e.g. `"odoo_pos_sync"`).
///
/// Each stream owns exactly one checkpoint row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new stream identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Run tracking
// ---------------------------------------------------------------------------

/// Terminal status of a sync run.
///
/// `DryRun` is kept distinct from `Success` so a no-op run is never
/// mistaken for a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    DryRun,
    Failed,
}

impl RunStatus {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
        }
    }

    /// Whether the process should exit zero for this status.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Success | Self::DryRun)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status '{0}'")]
pub struct UnknownRunStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownRunStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "dry_run" => Ok(Self::DryRun),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownRunStatus(other.to_string())),
        }
    }
}

/// Append-only record of one run's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLog {
    pub stream: StreamId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub records_processed: u64,
    pub status: RunStatus,
    pub error_count: u64,
    /// Newline-joined error messages, `None` when the run had no errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Persisted position of a stream.
///
/// `watermark` is the source's last-modified timestamp of the newest data
/// confirmed loaded. `None` means no data has been synced yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stream: StreamId,
    pub watermark: Option<DateTime<Utc>>,
    pub records_synced: u64,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
