//! Report envelopes produced by the reconciliation engine and the driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CandlewickError;
use crate::{InstrumentKey, Timeframe};

/// Last successful update of one series, derived from its tail after a
/// persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMarker {
    /// Instrument the series belongs to.
    pub instrument: InstrumentKey,
    /// Timeframe of the series.
    pub timeframe: Timeframe,
    /// Timestamp of the newest stored bar.
    pub last_bar: DateTime<Utc>,
    /// Wall-clock time the series was persisted.
    pub updated_at: DateTime<Utc>,
}

/// What one reconciliation pass did to a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ReconcileOutcome {
    /// The series was empty and has been seeded.
    Bootstrapped {
        /// Bars merged into the new series.
        merged: usize,
        /// Marker written for the new tail.
        marker: ReconciliationMarker,
    },
    /// The missing range was filled in chunks.
    Backfilled {
        /// Chunks that issued a provider request, including ones answered
        /// with no data.
        fetched_chunks: usize,
        /// Chunks skipped without a request (closed or past retention).
        skipped_chunks: usize,
        /// Bars that were new or replaced an existing record.
        merged: usize,
        /// Marker for the tail after the merge, if anything was persisted.
        marker: Option<ReconciliationMarker>,
    },
    /// The latest closed bar was appended.
    Incremental {
        /// Marker for the new tail.
        marker: ReconciliationMarker,
    },
    /// Nothing to do: the latest closed bar is already stored or every
    /// missing chunk was closed.
    UpToDate,
    /// The pass failed; the series was left unchanged.
    Failed(CandlewickError),
}

impl ReconcileOutcome {
    /// The marker produced by this pass, if the series changed.
    #[must_use]
    pub const fn marker(&self) -> Option<&ReconciliationMarker> {
        match self {
            Self::Bootstrapped { marker, .. } | Self::Incremental { marker } => Some(marker),
            Self::Backfilled { marker, .. } => marker.as_ref(),
            _ => None,
        }
    }

    /// True when the pass failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome for one (instrument, timeframe) pair within a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    /// Instrument reconciled.
    pub instrument: InstrumentKey,
    /// Timeframe reconciled.
    pub timeframe: Timeframe,
    /// Result of the pass.
    pub outcome: ReconcileOutcome,
}

/// Summary of one driver batch for a single timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Timeframe the batch processed.
    pub timeframe: Timeframe,
    /// Wall-clock time the batch started.
    pub started_at: DateTime<Utc>,
    /// One entry per registered instrument.
    pub outcomes: Vec<SeriesOutcome>,
    /// Set when the status record could not be written after the batch.
    pub status_error: Option<CandlewickError>,
}

impl TickReport {
    /// Number of pairs whose pass failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_failed()).count()
    }
}
