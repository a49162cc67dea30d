//! Series utilities shared by the stores, the engine, and monitoring.
//!
//! Modules include:
//! - `merge`: idempotent last-write-wins merge and bar sanitizing
//! - `resample`: aggregate finer bars into coarser intraday buckets
//! - `gaps`: gap, staleness, and malformed-row detection net of closures
/// Gap and staleness detection.
pub mod gaps;
/// Merge utilities for folding fetched bars into a stored series.
pub mod merge;
/// Resampling utilities for synthesizing coarser intraday bars.
pub mod resample;
