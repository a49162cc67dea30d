//! candlewick-core
//!
//! Core model and pure logic for collecting OHLCV bar series.
//!
//! - `types`: bars, currencies, provider requests, and shared re-exports.
//! - `session`: session profiles, holiday calendars, and the closed-window classifier.
//! - `registry`: the instrument universe.
//! - `timeseries`: merge, resample, and gap detection.
//! - `connector` / `store`: the traits the collector drives.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `handle::DriverHandle` wraps `tokio::task::JoinHandle<()>` and uses
//! `tokio::sync::oneshot::Sender<()>` for cooperative shutdown, so code that
//! spawns a driver must run under a Tokio 1.x runtime. Everything else in
//! this crate is runtime-agnostic.
#![warn(missing_docs)]

/// The `BarProvider` trait implemented by external sources.
pub mod connector;
/// Background task handle used by the collector driver.
pub mod handle;
mod instrument;
/// Middleware trait implemented by provider wrappers.
pub mod middleware;
mod registry;
/// Session calendars and the closed-window classifier.
pub mod session;
/// The `SeriesStore` persistence trait.
pub mod store;
/// Time-series utilities for merging, resampling, and gap detection.
pub mod timeseries;
pub mod types;

pub use connector::BarProvider;
pub use handle::DriverHandle;
pub use instrument::Instrument;
pub use middleware::Middleware;
pub use registry::InstrumentRegistry;
pub use session::{
    ClosedWindow, Closure, DailyBreak, HolidayCalendar, SessionCalendar, SessionProfile,
    WeeklyClosure,
};
pub use store::SeriesStore;
pub use timeseries::gaps::{Gap, GapDetector, SeriesHealth, Staleness, staleness_threshold};
pub use timeseries::merge::{MergeOutcome, merge_bars, normalize_ts, sanitize};
pub use timeseries::resample::{resample_to_minutes, resample_to_timeframe};
pub use types::*;
