//! Sync run outcome types.

use std::fmt;

use chrono::{DateTime, Utc};
use scout_types::state::{RunLog, RunStatus, StreamId};

use crate::execution::SyncPhase;

/// Most errors kept on one outcome; the total is still counted.
pub const MAX_RECORDED_ERRORS: usize = 100;

/// One non-fatal (or the final fatal) error of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub phase: SyncPhase,
    pub order_id: Option<i64>,
    pub message: String,
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_id {
            Some(id) => write!(f, "order {id}: {}", self.message),
            None => write!(f, "{}: {}", self.phase, self.message),
        }
    }
}

/// Result of one derived-layer refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Refreshed,
    Failed(String),
    /// Not attempted because an upstream layer failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub layer: String,
    pub status: RefreshStatus,
}

/// Aggregate record counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    /// Orders returned by the source.
    pub fetched: u64,
    /// Canonical transactions produced.
    pub transformed: u64,
    /// Rows accepted by the sink.
    pub loaded: u64,
}

/// Outcome of one sync run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub stream: StreamId,
    pub status: RunStatus,
    /// Last phase entered before the run stopped.
    pub phase: SyncPhase,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub counts: SyncCounts,
    /// First [`MAX_RECORDED_ERRORS`] errors.
    pub errors: Vec<RecordedError>,
    /// Total errors, including those not kept in `errors`.
    pub error_count: u64,
    pub watermark_before: Option<DateTime<Utc>>,
    pub watermark_after: Option<DateTime<Utc>>,
    pub refresh: Vec<RefreshOutcome>,
}

impl SyncOutcome {
    #[must_use]
    pub fn new(stream: StreamId, started_at: DateTime<Utc>) -> Self {
        Self {
            stream,
            status: RunStatus::Failed,
            phase: SyncPhase::Idle,
            started_at,
            completed_at: started_at,
            counts: SyncCounts::default(),
            errors: Vec::new(),
            error_count: 0,
            watermark_before: None,
            watermark_after: None,
            refresh: Vec::new(),
        }
    }

    pub fn record_error(&mut self, error: RecordedError) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        }
    }

    /// Success or dry run.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Newline-joined recorded errors, `None` when there are none.
    #[must_use]
    pub fn error_details(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut details = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        let omitted = self.error_count.saturating_sub(self.errors.len() as u64);
        if omitted > 0 {
            details.push_str(&format!("\n... and {omitted} more"));
        }
        Some(details)
    }

    /// Run-log entry: loaded rows for a real run, computed rows for a dry run.
    #[must_use]
    pub fn to_run_log(&self) -> RunLog {
        let records_processed = match self.status {
            RunStatus::DryRun => self.counts.transformed,
            RunStatus::Success | RunStatus::Failed => self.counts.loaded,
        };
        RunLog {
            stream: self.stream.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            records_processed,
            status: self.status,
            error_count: self.error_count,
            error_details: self.error_details(),
        }
    }
}
