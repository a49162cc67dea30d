use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use candlewick_core::{
    Bar, BarProvider, CandlewickError, FetchRequest, FetchSpan, ProviderLimits, Timeframe,
};

/// Instruction for how a fetch should behave for a given symbol.
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Serve these bars, restricted to the requested window.
    Return(Vec<Bar>),
    /// Like `Return`, after holding the call open for a while.
    Delay(Duration, Vec<Bar>),
    /// Fail immediately with the provided error.
    Fail(CandlewickError),
    /// Answer `NoData`.
    NoData,
    /// Hang indefinitely (simulate a timeout).
    Hang,
}

/// Static capabilities of a [`DynamicMockProvider`].
#[derive(Clone, Debug)]
pub struct MockOptions {
    /// Limits reported for every timeframe.
    pub limits: ProviderLimits,
    /// Timeframes the provider claims not to serve.
    pub unsupported: Vec<Timeframe>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            limits: ProviderLimits::unbounded(10_000),
            unsupported: Vec::new(),
        }
    }
}

#[derive(Default)]
struct InternalState {
    rules: HashMap<String, MockBehavior>,
    queued: HashMap<String, VecDeque<MockBehavior>>,
    requests: Vec<(String, FetchRequest)>,
}

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight<'a>(&'a Gauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
    gauge: Arc<Gauge>,
}

impl DynamicMockController {
    /// Set the standing behavior for a symbol.
    pub async fn set_behavior(&self, symbol: &str, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.rules.insert(symbol.to_string(), behavior);
    }

    /// Queue a one-shot behavior for the next call on `symbol`. Queued
    /// behaviors are consumed in order before the standing one applies.
    pub async fn push_behavior(&self, symbol: &str, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard
            .queued
            .entry(symbol.to_string())
            .or_default()
            .push_back(behavior);
    }

    /// Every request seen so far, in arrival order.
    pub async fn requests(&self) -> Vec<(String, FetchRequest)> {
        self.state.lock().await.requests.clone()
    }

    /// Number of fetch calls seen so far.
    pub async fn calls(&self) -> usize {
        self.state.lock().await.requests.len()
    }

    /// Highest number of fetches observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    /// Clear all configured behaviors and the request log.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.rules.clear();
        guard.queued.clear();
        guard.requests.clear();
    }
}

/// A provider that defers all behavior to an external controller. Symbols
/// without a configured behavior answer `NoData`.
pub struct DynamicMockProvider {
    name: &'static str,
    options: MockOptions,
    state: Arc<Mutex<InternalState>>,
    gauge: Arc<Gauge>,
}

impl DynamicMockProvider {
    /// Create a new dynamic mock provider and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<dyn BarProvider>, DynamicMockController) {
        Self::with_options(name, MockOptions::default())
    }

    /// Like [`new_with_controller`](Self::new_with_controller) with explicit capabilities.
    #[must_use]
    pub fn with_options(
        name: &'static str,
        options: MockOptions,
    ) -> (Arc<dyn BarProvider>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let gauge = Arc::new(Gauge::default());
        let controller = DynamicMockController {
            state: Arc::clone(&state),
            gauge: Arc::clone(&gauge),
        };
        let me = Arc::new(Self {
            name,
            options,
            state,
            gauge,
        });
        (me as Arc<dyn BarProvider>, controller)
    }
}

fn within(bars: Vec<Bar>, span: FetchSpan) -> Vec<Bar> {
    match span {
        FetchSpan::Window { start, end } => bars
            .into_iter()
            .filter(|b| start <= b.ts && b.ts < end)
            .collect(),
        FetchSpan::Lookback(_) => bars,
    }
}

#[async_trait]
impl BarProvider for DynamicMockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "DynamicMock"
    }

    fn supports(&self, timeframe: Timeframe) -> bool {
        !self.options.unsupported.contains(&timeframe)
    }

    fn limits(&self, _timeframe: Timeframe) -> ProviderLimits {
        self.options.limits
    }

    async fn fetch(&self, symbol: &str, req: FetchRequest) -> Result<Vec<Bar>, CandlewickError> {
        let _in_flight = InFlight::enter(&self.gauge);
        // Snapshot the behavior without holding the lock across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.requests.push((symbol.to_string(), req));
            let queued = guard.queued.get_mut(symbol).and_then(VecDeque::pop_front);
            queued.or_else(|| guard.rules.get(symbol).cloned())
        };

        let bars = match behavior {
            Some(MockBehavior::Return(bars)) => bars,
            Some(MockBehavior::Delay(pause, bars)) => {
                tokio::time::sleep(pause).await;
                bars
            }
            Some(MockBehavior::Fail(e)) => return Err(e),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(MockBehavior::NoData) | None => Vec::new(),
        };
        let bars = within(bars, req.span);
        if bars.is_empty() {
            return Err(CandlewickError::no_data(format!("{symbol} {}", req.timeframe)));
        }
        Ok(bars)
    }
}
