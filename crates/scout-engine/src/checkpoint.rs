//! Watermark computation and monotonic checkpoint advancement.

use chrono::{DateTime, Utc};
use scout_state::error::Result;
use scout_state::CheckpointStore;
use scout_types::state::{Checkpoint, RunStatus, StreamId};

/// Latest modification time among the given (successfully transformed)
/// orders' `write_date`s.
pub fn computed_watermark<I>(timestamps: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    timestamps.into_iter().flatten().max()
}

/// Like [`computed_watermark`], but ignores timestamps at or after
/// `boundary`. A full page may end partway through the orders sharing its
/// last `write_date`; that group stays above the watermark so the next run
/// fetches it again.
pub fn settled_watermark<I>(timestamps: I, boundary: Option<DateTime<Utc>>) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    computed_watermark(
        timestamps
            .into_iter()
            .filter(|ts| boundary.map_or(true, |boundary| ts.is_some_and(|ts| ts < boundary))),
    )
}

/// Outcome of comparing a run's watermark with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkAdvance {
    /// The run saw newer data.
    Advanced {
        from: Option<DateTime<Utc>>,
        to: DateTime<Utc>,
    },
    /// Nothing newer than the stored watermark.
    Unchanged(Option<DateTime<Utc>>),
    /// The run's watermark is older than the stored one and is discarded.
    Refused {
        stored: DateTime<Utc>,
        computed: DateTime<Utc>,
    },
}

impl WatermarkAdvance {
    /// Watermark to persist. Never earlier than the stored one.
    #[must_use]
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Advanced { to, .. } => Some(to),
            Self::Unchanged(stored) => stored,
            Self::Refused { stored, .. } => Some(stored),
        }
    }
}

/// Decide the next watermark. The stored watermark never regresses.
#[must_use]
pub fn advance_watermark(
    stored: Option<DateTime<Utc>>,
    computed: Option<DateTime<Utc>>,
) -> WatermarkAdvance {
    match (stored, computed) {
        (_, None) => WatermarkAdvance::Unchanged(stored),
        (None, Some(to)) => WatermarkAdvance::Advanced { from: None, to },
        (Some(stored), Some(computed)) if computed > stored => WatermarkAdvance::Advanced {
            from: Some(stored),
            to: computed,
        },
        (Some(stored), Some(computed)) if computed == stored => {
            WatermarkAdvance::Unchanged(Some(stored))
        }
        (Some(stored), Some(computed)) => WatermarkAdvance::Refused { stored, computed },
    }
}

/// Persist the checkpoint after a successful load. Returns the stored
/// watermark.
pub(crate) async fn persist_checkpoint<C: CheckpointStore>(
    store: &C,
    stream: &StreamId,
    advance: WatermarkAdvance,
    records_synced: u64,
) -> Result<Option<DateTime<Utc>>> {
    match advance {
        WatermarkAdvance::Advanced { from, to } => tracing::info!(
            stream = %stream,
            from = ?from,
            to = %to,
            "Watermark advanced"
        ),
        WatermarkAdvance::Unchanged(at) => tracing::info!(
            stream = %stream,
            watermark = ?at,
            "Watermark unchanged"
        ),
        WatermarkAdvance::Refused { stored, computed } => tracing::warn!(
            stream = %stream,
            stored = %stored,
            computed = %computed,
            "Refusing to move watermark backwards"
        ),
    }
    let checkpoint = Checkpoint {
        stream: stream.clone(),
        watermark: advance.watermark(),
        records_synced,
        status: RunStatus::Success,
        error_message: None,
    };
    store.set_checkpoint(&checkpoint).await?;
    Ok(checkpoint.watermark)
}
