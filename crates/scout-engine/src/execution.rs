//! Execution options and orchestrator phases.

use std::fmt;

/// Runtime execution options (flags, not part of the config file).
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Ignore the stored watermark and extract from the beginning.
    pub full_resync: bool,
    /// Transform without writing to the sink or advancing the checkpoint.
    pub dry_run: bool,
    /// Overrides `resources.batch_size`.
    pub batch_size: Option<usize>,
}

/// States of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    Authenticating,
    ExtractingOrders,
    ExtractingDimensions,
    Transforming,
    Loading,
    RefreshingDerived,
    CheckpointAdvance,
    Done,
    Failed,
}

impl SyncPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::ExtractingOrders => "extracting_orders",
            Self::ExtractingDimensions => "extracting_dimensions",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::RefreshingDerived => "refreshing_derived",
            Self::CheckpointAdvance => "checkpoint_advance",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether the run has stopped.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
