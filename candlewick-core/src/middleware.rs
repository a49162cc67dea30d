//! Middleware trait for wrapping `BarProvider` implementations.

use std::sync::Arc;

use crate::connector::BarProvider;

/// Trait implemented by provider middleware layers.
///
/// A middleware consumes an inner `BarProvider` and returns a wrapped provider
/// that augments or restricts behavior (e.g., quotas).
pub trait Middleware: Send + Sync {
    /// Apply this middleware to wrap an inner provider and return the wrapped provider.
    fn apply(self: Box<Self>, inner: Arc<dyn BarProvider>) -> Arc<dyn BarProvider>;

    /// Human-readable middleware name for introspection/logging.
    fn name(&self) -> &'static str;

    /// Opaque configuration snapshot for serialization/inspection.
    fn config_json(&self) -> serde_json::Value;
}
