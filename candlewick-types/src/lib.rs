//! Candlewick-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod config;
mod error;
mod key;
mod reports;
mod timeframe;

pub use config::{ChunkDelay, CollectorConfig, QuotaConfig, QuotaConsumptionStrategy};
pub use error::CandlewickError;
pub use key::InstrumentKey;
pub use reports::{ReconcileOutcome, ReconciliationMarker, SeriesOutcome, TickReport};
pub use timeframe::Timeframe;
