//! Candlewick keeps local OHLCV bar series complete and current.
//!
//! Overview
//! - Collects bars for a fixed universe of instruments at several timeframes
//!   from one [`BarProvider`] into a [`SeriesStore`] (CSV files by default).
//! - Distinguishes data that is missing from data that never existed: the
//!   session calendar explains weekends, daily breaks, and holidays, so those
//!   windows are neither fetched nor reported as gaps.
//! - Records when each series was last updated in a JSON status file.
//!
//! Key behaviors and trade-offs
//! - Reconciliation: a series more than one bar behind is backfilled in
//!   chunks capped by the provider's per-request limit; chunks that lie in a
//!   closed window or beyond the provider's retention are skipped without a
//!   request. Otherwise only the latest closed bar is fetched.
//! - Failure isolation: a failing fetch discards the whole pass, leaving the
//!   stored series untouched; other series in the same tick proceed.
//! - Persistence: every write replaces the file atomically and merges are
//!   idempotent, so re-running a pass never duplicates or reorders bars.
//! - Concurrency: one limiter bounds provider calls across every instrument,
//!   timeframe, and chunk. A jittered pause separates consecutive chunks.
//! - Resampling: timeframes the provider cannot serve are synthesized from
//!   the next finer one (e.g. `4h` from `1h`).
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use candlewick::{Collector, Timeframe};
//!
//! let collector = Arc::new(
//!     Collector::builder()
//!         .with_provider(Arc::new(MyProvider::new()))
//!         .data_dir("data")
//!         .status_path("data/status.json")
//!         .timeframes(&[Timeframe::M5, Timeframe::H1, Timeframe::H4])
//!         .build()?,
//! );
//!
//! // One batch, on demand:
//! let report = collector.tick(Timeframe::H1, chrono::Utc::now()).await;
//! println!("{} failures", report.failures());
//!
//! // Or run continuously until stopped:
//! let handle = collector.clone().spawn();
//! // ...
//! handle.stop().await;
//! ```
#![warn(missing_docs)]

mod backoff;
mod collector;
mod driver;
/// Reconciliation engine and its chunk planning helpers.
pub mod engine;
mod maintenance;
/// CSV series files and the status record.
pub mod store;

pub use collector::{Collector, CollectorBuilder};
pub use driver::next_due;
pub use store::{CsvSeriesStore, StatusMap, StatusStore};

pub use candlewick_middleware::{ProviderBuilder, QuotaAwareProvider, QuotaMiddleware};

// Re-export core types for convenience
pub use candlewick_core::{
    AssetClass, Bar, BarProvider, CandlewickError, ChunkDelay, ClosedWindow, Closure,
    CollectorConfig, Currency, DriverHandle, FetchRequest, FetchSpan, Gap, GapDetector,
    HolidayCalendar, Instrument, InstrumentKey, InstrumentRegistry, MergeOutcome, ProviderLimits,
    QuotaConfig, QuotaConsumptionStrategy, ReconcileOutcome, ReconciliationMarker, SeriesHealth,
    SeriesOutcome, SeriesStore, SessionCalendar, SessionProfile, TickReport, Timeframe,
};
