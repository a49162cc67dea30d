//! Instrument identifiers usable across crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal instrument key, e.g. `eurusd` or `xauusd`.
///
/// Keys are lower-case and double as series file stems, so construction
/// normalizes case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentKey(String);

impl InstrumentKey {
    /// Construct a key, lower-casing the input.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstrumentKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
