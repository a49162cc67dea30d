use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candlewick workspace.
///
/// Provider failures, malformed bars, persistence problems, and
/// construction-time validation errors all flow through this enum so that a
/// failed reconciliation can be recorded in a report without aborting the
/// driver.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CandlewickError {
    /// The requested timeframe or operation is not implemented by the provider.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// A capability string describing what was requested (e.g. "history/4h").
        capability: String,
    },

    /// A bar failed structural validation (inconsistent OHLC, non-positive
    /// extreme, missing field).
    #[error("data issue: {0}")]
    Data(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A provider call failed.
    #[error("{provider} failed: {msg}")]
    Provider {
        /// Provider name that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The provider answered but had no bars for the requested window.
    #[error("no data: {what}")]
    NoData {
        /// Description of the empty request, e.g. "EURUSD=X 1m window".
        what: String,
    },

    /// An individual provider call exceeded the configured timeout.
    #[error("provider timed out: {capability} via {provider}")]
    ProviderTimeout {
        /// Provider name that timed out.
        provider: String,
        /// Capability label (e.g. "fetch/1m").
        capability: String,
    },

    /// The request exceeds the configured quota budget for the current window.
    #[error("quota exceeded: remaining={remaining} reset_in_ms={reset_in_ms}")]
    QuotaExceeded {
        /// Remaining units at the time of rejection.
        remaining: u64,
        /// Milliseconds until the quota window resets.
        reset_in_ms: u64,
    },

    /// Reading or writing a series or status file failed.
    #[error("persistence failed for {path}: {msg}")]
    Persistence {
        /// File the operation targeted.
        path: String,
        /// Underlying I/O or encoding error.
        msg: String,
    },

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of missing resource, e.g. "instrument eurusd".
        what: String,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl CandlewickError {
    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub fn unsupported(cap: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: cap.into(),
        }
    }

    /// Helper: build a `Provider` error with the provider name and message.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NoData` error describing the empty request.
    pub fn no_data(what: impl Into<String>) -> Self {
        Self::NoData { what: what.into() }
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// Helper: build a `Persistence` error for a path and an underlying error.
    pub fn persistence(path: impl AsRef<std::path::Path>, msg: impl ToString) -> Self {
        Self::Persistence {
            path: path.as_ref().display().to_string(),
            msg: msg.to_string(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Returns true for the "empty window" signal that backfill treats as
    /// skip-and-continue.
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Returns true if the error originates from talking to the external
    /// source. These are transient: the next scheduled cycle retries.
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::NoData { .. }
                | Self::ProviderTimeout { .. }
                | Self::QuotaExceeded { .. }
        )
    }
}
