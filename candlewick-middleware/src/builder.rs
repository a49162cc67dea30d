//! Builder for composing a provider with middleware layers.
//!
//! Layers form an onion around the raw provider. The `layers` vector stores
//! them outermost-first (last added = outermost) and `build()` applies them
//! in reverse, so `builder.layer(a).layer(b)` yields `b(a(raw))`.

use std::sync::Arc;
use std::time::Duration;

use candlewick_core::{BarProvider, Middleware};
use candlewick_types::{QuotaConfig, QuotaConsumptionStrategy};

use crate::quota::QuotaMiddleware;

const QUOTA: &str = "QuotaAwareProvider";

/// Generic middleware builder for composing a provider with layered wrappers.
pub struct ProviderBuilder {
    raw: Arc<dyn BarProvider>,
    /// Middleware layers in outermost-first order.
    layers: Vec<Box<dyn Middleware>>,
}

impl ProviderBuilder {
    /// Create a new builder from a raw, unwrapped provider.
    #[must_use]
    pub fn new(raw: Arc<dyn BarProvider>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    fn existing_quota_config(&self) -> Option<QuotaConfig> {
        let layer = self.layers.iter().find(|l| l.name() == QUOTA)?;
        let cfg = layer.config_json();
        let defaults = QuotaConfig::default();
        let limit = cfg
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(defaults.limit);
        let window = cfg
            .get("window_ms")
            .and_then(serde_json::Value::as_u64)
            .map_or(defaults.window, Duration::from_millis);
        let strategy = match cfg.get("strategy").and_then(|v| v.as_str()) {
            Some("EvenSpreadHourly") => QuotaConsumptionStrategy::EvenSpreadHourly,
            Some("Unit") => QuotaConsumptionStrategy::Unit,
            _ => defaults.strategy,
        };
        Some(QuotaConfig {
            limit,
            window,
            strategy,
        })
    }

    /// Add or replace the quota layer, placing it outermost.
    #[must_use]
    pub fn with_quota(mut self, cfg: &QuotaConfig) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self.layers
            .insert(0, Box::new(QuotaMiddleware::new(cfg.clone())));
        self
    }

    /// Remove quota if present.
    #[must_use]
    pub fn without_quota(mut self) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self
    }

    /// Shortcut: set quota limit only (preserves existing window/strategy if already set).
    #[must_use]
    pub fn quota_limit(self, limit: u64) -> Self {
        let mut cfg = self.existing_quota_config().unwrap_or_default();
        cfg.limit = limit;
        self.with_quota(&cfg)
    }

    /// Shortcut: set window (preserves existing limit/strategy if already set).
    #[must_use]
    pub fn quota_window(self, window: Duration) -> Self {
        let mut cfg = self.existing_quota_config().unwrap_or_default();
        cfg.window = window;
        self.with_quota(&cfg)
    }

    /// Shortcut: set strategy (preserves existing limit/window if already set).
    #[must_use]
    pub fn quota_strategy(self, strategy: QuotaConsumptionStrategy) -> Self {
        let mut cfg = self.existing_quota_config().unwrap_or_default();
        cfg.strategy = strategy;
        self.with_quota(&cfg)
    }

    /// Add an arbitrary middleware layer at the outermost position.
    #[must_use]
    pub fn layer(mut self, layer: Box<dyn Middleware>) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Layer names, outermost first, followed by the raw provider's name.
    #[must_use]
    pub fn describe(&self) -> Vec<(&'static str, serde_json::Value)> {
        let mut out: Vec<_> = self
            .layers
            .iter()
            .map(|l| (l.name(), l.config_json()))
            .collect();
        out.push((self.raw.name(), serde_json::json!({ "raw": true })));
        out
    }

    /// Build the wrapped provider.
    ///
    /// With `layers = [Outer, Inner]` the result is `Outer(Inner(raw))`.
    #[must_use]
    pub fn build(self) -> Arc<dyn BarProvider> {
        let mut acc: Arc<dyn BarProvider> = Arc::clone(&self.raw);
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
