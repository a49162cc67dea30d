//! Deterministic bars and calendars shared by tests across the workspace.

mod bars;
mod calendar;

pub use bars::{bar, flat, series, synthetic};
pub use calendar::{calendar, holidays};
