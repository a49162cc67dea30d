//! Test doubles for the candlewick collector.
//!
//! - [`MockProvider`]: a deterministic source that synthesizes a bar for every
//!   grid slot in the requested span.
//! - [`DynamicMockProvider`]: a source whose answers are scripted per symbol
//!   from the outside, with request logging and an in-flight gauge.
//! - [`MemorySeriesStore`]: a [`SeriesStore`](candlewick_core::SeriesStore)
//!   kept in memory.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use candlewick_core::{
    Bar, BarProvider, CandlewickError, FetchRequest, FetchSpan, ProviderLimits, Timeframe,
};
use chrono::Utc;

mod dynamic;
pub mod fixtures;
mod store;

pub use dynamic::{DynamicMockController, DynamicMockProvider, MockBehavior, MockOptions};
pub use store::MemorySeriesStore;

/// Mock provider for CI-safe demos. Answers every request from a synthetic,
/// timestamp-derived price path.
///
/// A few symbols are special:
/// - `"FAIL"` fails with a provider error
/// - `"EMPTY"` answers `NoData`
/// - `"TIMEOUT"` sleeps 200ms before answering
pub struct MockProvider {
    limits: ProviderLimits,
    unsupported: Vec<Timeframe>,
    calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limits: ProviderLimits::unbounded(10_000),
            unsupported: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the per-request cap and retention horizon for every timeframe.
    #[must_use]
    pub const fn with_limits(mut self, limits: ProviderLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Stop serving `timeframe` natively.
    #[must_use]
    pub fn without_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.unsupported.push(timeframe);
        self
    }

    /// Number of `fetch` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarProvider for MockProvider {
    fn name(&self) -> &'static str {
        "candlewick-mock"
    }

    fn vendor(&self) -> &'static str {
        "Mock"
    }

    fn supports(&self, timeframe: Timeframe) -> bool {
        !self.unsupported.contains(&timeframe)
    }

    fn limits(&self, _timeframe: Timeframe) -> ProviderLimits {
        self.limits
    }

    async fn fetch(&self, symbol: &str, req: FetchRequest) -> Result<Vec<Bar>, CandlewickError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match symbol {
            "FAIL" => {
                return Err(CandlewickError::provider(
                    "candlewick-mock",
                    format!("forced failure for {}", req.timeframe),
                ));
            }
            "EMPTY" => return Err(CandlewickError::no_data(format!("{symbol} {}", req.timeframe))),
            "TIMEOUT" => tokio::time::sleep(std::time::Duration::from_millis(200)).await,
            _ => {}
        }
        if !self.supports(req.timeframe) {
            return Err(CandlewickError::unsupported(format!("timeframe {}", req.timeframe)));
        }

        let (start, end) = match req.span {
            FetchSpan::Window { start, end } => (start, end),
            FetchSpan::Lookback(period) => {
                let now = Utc::now();
                (now - period, now)
            }
        };
        let bars = fixtures::synthetic(req.timeframe, start, end);
        if bars.is_empty() {
            return Err(CandlewickError::no_data(format!("{symbol} {}", req.timeframe)));
        }
        Ok(bars)
    }
}
