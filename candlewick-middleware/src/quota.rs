//! Quota-aware provider wrapper.
//!
//! Every fetch consumes one unit of a fixed-window budget. With
//! [`QuotaConsumptionStrategy::EvenSpreadHourly`] the window is further cut
//! into 24 slices so a large backfill cannot drain the budget in one burst.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use candlewick_core::{
    Bar, BarProvider, CandlewickError, FetchRequest, Middleware, ProviderLimits, Timeframe,
};
use candlewick_types::{QuotaConfig, QuotaConsumptionStrategy};

/// Wrapper that enforces a request budget on its inner provider.
pub struct QuotaAwareProvider {
    inner: Arc<dyn BarProvider>,
    config: QuotaConfig,
    runtime: Mutex<QuotaRuntime>,
}

struct QuotaRuntime {
    // Window tracking
    calls_made_in_window: u64,
    last_reset: Instant,

    // Slice tracking, EvenSpreadHourly only
    allowed_per_slice: u64,
    slice_duration: Duration,
    calls_made_in_slice: u64,
    slice_start: Instant,
}

/// Advance `start` to the most recent `period` boundary at or before `now`.
fn align(start: &mut Instant, now: Instant, period: Duration) {
    let elapsed = now.duration_since(*start);
    let passed = elapsed.as_nanos() / period.as_nanos().max(1);
    let offset = Duration::from_nanos(
        (passed * period.as_nanos())
            .try_into()
            .unwrap_or(u64::MAX),
    );
    *start += offset;
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}

impl QuotaAwareProvider {
    /// Wrap `inner` with the budget described by `config`.
    pub fn new(inner: Arc<dyn BarProvider>, config: QuotaConfig) -> Self {
        let (allowed_per_slice, slice_duration) = match config.strategy {
            QuotaConsumptionStrategy::EvenSpreadHourly => {
                let slices = 24u64;
                let per_slice = std::cmp::max(1, config.limit / slices);
                // Millisecond slices keep short test windows deterministic.
                let slice_ms = std::cmp::max(1, millis(config.window) / slices);
                (per_slice, Duration::from_millis(slice_ms))
            }
            _ => (0, Duration::ZERO),
        };
        let now = Instant::now();

        Self {
            inner,
            config,
            runtime: Mutex::new(QuotaRuntime {
                calls_made_in_window: 0,
                last_reset: now,
                allowed_per_slice,
                slice_duration,
                calls_made_in_slice: 0,
                slice_start: now,
            }),
        }
    }

    /// Access the wrapped provider.
    pub fn inner(&self) -> &Arc<dyn BarProvider> {
        &self.inner
    }

    /// Consume one unit if the budget allows it.
    ///
    /// # Errors
    /// Returns `CandlewickError::QuotaExceeded` when the current slice (for
    /// `EvenSpreadHourly`) or the whole window is exhausted. A slice block
    /// reports the units still left in the window and the time until the
    /// next slice; a window block reports zero and the time until reset.
    pub fn should_allow_call(&self) -> Result<(), CandlewickError> {
        let mut rt = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let limit = self.config.limit;
        let window = self.config.window;

        if now.duration_since(rt.last_reset) >= window {
            rt.calls_made_in_window = 0;
            align(&mut rt.last_reset, now, window);
        }

        if matches!(self.config.strategy, QuotaConsumptionStrategy::EvenSpreadHourly) {
            if now.duration_since(rt.slice_start) >= rt.slice_duration {
                rt.calls_made_in_slice = 0;
                let slice = rt.slice_duration;
                align(&mut rt.slice_start, now, slice);
            }

            if rt.calls_made_in_slice >= rt.allowed_per_slice && rt.calls_made_in_window < limit {
                let reset_in_ms =
                    millis(rt.slice_duration.saturating_sub(now.duration_since(rt.slice_start)));
                return Err(CandlewickError::QuotaExceeded {
                    remaining: limit.saturating_sub(rt.calls_made_in_window),
                    reset_in_ms,
                });
            }
        }

        if rt.calls_made_in_window < limit {
            rt.calls_made_in_window += 1;
            if matches!(self.config.strategy, QuotaConsumptionStrategy::EvenSpreadHourly) {
                rt.calls_made_in_slice += 1;
            }
            return Ok(());
        }

        let reset_in_ms = millis(window.saturating_sub(now.duration_since(rt.last_reset)));
        let remaining = limit.saturating_sub(rt.calls_made_in_window);
        drop(rt);
        Err(CandlewickError::QuotaExceeded {
            remaining,
            reset_in_ms,
        })
    }
}

#[async_trait]
impl BarProvider for QuotaAwareProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn vendor(&self) -> &'static str {
        self.inner.vendor()
    }

    fn supports(&self, timeframe: Timeframe) -> bool {
        self.inner.supports(timeframe)
    }

    fn limits(&self, timeframe: Timeframe) -> ProviderLimits {
        self.inner.limits(timeframe)
    }

    async fn fetch(&self, symbol: &str, req: FetchRequest) -> Result<Vec<Bar>, CandlewickError> {
        if let Err(e) = self.should_allow_call() {
            #[cfg(feature = "tracing")]
            tracing::debug!(provider = self.inner.name(), symbol, error = %e, "quota blocked fetch");
            return Err(e);
        }
        self.inner.fetch(symbol, req).await
    }
}

/// Middleware config for constructing a [`QuotaAwareProvider`].
pub struct QuotaMiddleware {
    pub config: QuotaConfig,
}

impl QuotaMiddleware {
    #[must_use]
    pub const fn new(config: QuotaConfig) -> Self {
        Self { config }
    }
}

impl Middleware for QuotaMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn BarProvider>) -> Arc<dyn BarProvider> {
        Arc::new(QuotaAwareProvider::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "QuotaAwareProvider"
    }

    fn config_json(&self) -> serde_json::Value {
        let strategy = match self.config.strategy {
            QuotaConsumptionStrategy::EvenSpreadHourly => "EvenSpreadHourly",
            _ => "Unit",
        };
        serde_json::json!({
            "limit": self.config.limit,
            "window_ms": self.config.window.as_millis(),
            "strategy": strategy,
        })
    }
}
