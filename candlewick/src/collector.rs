use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use candlewick_core::types::{Bar, FetchRequest};
use candlewick_core::{
    BarProvider, CandlewickError, ChunkDelay, CollectorConfig, InstrumentRegistry, QuotaConfig,
    SeriesStore, SessionCalendar, Timeframe,
};
use candlewick_middleware::ProviderBuilder;
use tokio::sync::Semaphore;

use crate::store::{CsvSeriesStore, StatusStore};

/// Collects OHLCV bars for a fixed instrument universe from one provider into
/// a series store.
///
/// A collector owns the concurrency limiter shared by every provider call it
/// makes, so the in-flight bound holds across instruments, timeframes, and
/// backfill chunks alike.
pub struct Collector {
    pub(crate) provider: Arc<dyn BarProvider>,
    pub(crate) store: Arc<dyn SeriesStore>,
    pub(crate) status: StatusStore,
    pub(crate) registry: InstrumentRegistry,
    pub(crate) calendar: SessionCalendar,
    pub(crate) cfg: CollectorConfig,
    pub(crate) limiter: Arc<Semaphore>,
}

/// Builder for constructing a [`Collector`].
pub struct CollectorBuilder {
    provider: Option<Arc<dyn BarProvider>>,
    store: Option<Arc<dyn SeriesStore>>,
    registry: Option<InstrumentRegistry>,
    calendar: Option<SessionCalendar>,
    cfg: CollectorConfig,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorBuilder {
    /// Create a builder with default configuration.
    ///
    /// Behavior and trade-offs:
    /// - No provider is registered; [`with_provider`](Self::with_provider) is required.
    /// - Registry and calendar default to the standard universe and sessions.
    /// - The store defaults to CSV files under `data_dir`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: None,
            store: None,
            registry: None,
            calendar: None,
            cfg: CollectorConfig::default(),
        }
    }

    /// Register the bar provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn BarProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a custom series store instead of CSV files under `data_dir`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SeriesStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the instrument universe.
    #[must_use]
    pub fn registry(mut self, registry: InstrumentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the session calendar.
    #[must_use]
    pub fn calendar(mut self, calendar: SessionCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: CollectorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Root directory of the default CSV store.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cfg.data_dir = dir.into();
        self
    }

    /// Location of the status record.
    #[must_use]
    pub fn status_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.status_path = path.into();
        self
    }

    /// Timeframes the driver collects.
    #[must_use]
    pub fn timeframes(mut self, timeframes: &[Timeframe]) -> Self {
        self.cfg.timeframes = timeframes.to_vec();
        self
    }

    /// Maximum simultaneous provider calls.
    ///
    /// Behavior and trade-offs:
    /// - Bounds every call the collector makes, including chunks of one backfill.
    /// - Lower values are gentler on rate-limited sources but lengthen a tick.
    #[must_use]
    pub const fn max_in_flight(mut self, n: usize) -> Self {
        self.cfg.max_in_flight = n;
        self
    }

    /// Timeout for each provider call.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Sleep between driver ticks.
    #[must_use]
    pub const fn tick_interval(mut self, interval: Duration) -> Self {
        self.cfg.tick_interval = interval;
        self
    }

    /// Pause between consecutive backfill fetches.
    #[must_use]
    pub const fn chunk_delay(mut self, delay: ChunkDelay) -> Self {
        self.cfg.chunk_delay = delay;
        self
    }

    /// Seed empty series with `history` instead of only the latest closed bar.
    #[must_use]
    pub const fn bootstrap_history(mut self, history: Option<Duration>) -> Self {
        self.cfg.bootstrap_history = history;
        self
    }

    /// Enforce a request budget on the provider.
    #[must_use]
    pub fn quota(mut self, quota: QuotaConfig) -> Self {
        self.cfg.quota = Some(quota);
        self
    }

    /// Build the collector.
    ///
    /// # Errors
    /// - `InvalidArg` if no provider was registered.
    /// - `Config` if the configuration is inconsistent or an instrument names
    ///   an unknown session profile.
    /// - `Persistence` if an existing status record cannot be read.
    pub fn build(self) -> Result<Collector, CandlewickError> {
        let Some(raw) = self.provider else {
            return Err(CandlewickError::InvalidArg(
                "no provider registered; add one via with_provider(...)".to_string(),
            ));
        };
        self.cfg.validate()?;

        let registry = match self.registry {
            Some(r) => r,
            None => InstrumentRegistry::standard()?,
        };
        let calendar = self.calendar.unwrap_or_else(SessionCalendar::standard);
        registry.check_sessions(&calendar)?;

        let provider = match &self.cfg.quota {
            Some(q) => ProviderBuilder::new(raw).with_quota(q).build(),
            None => raw,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(CsvSeriesStore::new(&self.cfg.data_dir)));
        let status = StatusStore::open(&self.cfg.status_path)?;
        let limiter = Arc::new(Semaphore::new(self.cfg.max_in_flight));

        #[cfg(feature = "tracing")]
        tracing::info!(
            provider = provider.name(),
            instruments = registry.len(),
            max_in_flight = self.cfg.max_in_flight,
            "collector built"
        );

        Ok(Collector {
            provider,
            store,
            status,
            registry,
            calendar,
            cfg: self.cfg,
            limiter,
        })
    }
}

impl Collector {
    /// Start building a collector.
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use candlewick::{Collector, Timeframe};
    ///
    /// let collector = Collector::builder()
    ///     .with_provider(Arc::new(MyProvider::new()))
    ///     .data_dir("data")
    ///     .timeframes(&[Timeframe::M5, Timeframe::H1])
    ///     .max_in_flight(8)
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }

    /// The instrument universe.
    #[must_use]
    pub const fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    /// The session calendar.
    #[must_use]
    pub const fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.cfg
    }

    /// The status record.
    #[must_use]
    pub const fn status(&self) -> &StatusStore {
        &self.status
    }

    /// The series store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn SeriesStore> {
        Arc::clone(&self.store)
    }

    /// The provider, wrapped in its quota layer when one is configured.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn BarProvider> {
        Arc::clone(&self.provider)
    }

    /// Wrap a provider future with a timeout and standardized timeout error mapping.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlewick::collector::provider_call_with_timeout",
            skip(fut),
            fields(
                provider = provider_name,
                capability = %capability,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        )
    )]
    pub(crate) async fn provider_call_with_timeout<T, Fut>(
        provider_name: &'static str,
        capability: &str,
        timeout: Duration,
        fut: Fut,
    ) -> Result<T, CandlewickError>
    where
        Fut: core::future::Future<Output = Result<T, CandlewickError>>,
    {
        (tokio::time::timeout(timeout, fut).await).unwrap_or_else(|_| {
            Err(CandlewickError::provider_timeout(provider_name, capability))
        })
    }

    /// One provider call under the shared limiter and the provider timeout.
    ///
    /// The permit is held until the call returns or times out.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlewick::collector::fetch",
            skip(self, req),
            fields(symbol = %symbol, timeframe = %req.timeframe),
        )
    )]
    pub(crate) async fn fetch(
        &self,
        symbol: &str,
        req: FetchRequest,
    ) -> Result<Vec<Bar>, CandlewickError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| CandlewickError::Other("concurrency limiter closed".into()))?;
        let capability = format!("bars {}", req.timeframe);
        Self::provider_call_with_timeout(
            self.provider.name(),
            &capability,
            self.cfg.provider_timeout,
            self.provider.fetch(symbol, req),
        )
        .await
    }
}
