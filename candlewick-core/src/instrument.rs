use serde::{Deserialize, Serialize};

use crate::types::{AssetClass, Currency};
use crate::{CandlewickError, InstrumentKey};

/// An instrument the collector tracks.
///
/// Immutable once registered. The `session` field names a
/// [`SessionProfile`](crate::session::SessionProfile) in the calendar; `None`
/// means the classifier falls back on currency exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InstrumentSpec")]
pub struct Instrument {
    key: InstrumentKey,
    provider_symbol: String,
    currencies: Vec<Currency>,
    asset_class: AssetClass,
    session: Option<String>,
}

/// Raw, unvalidated instrument definition as it appears in a universe file.
#[derive(Debug, Clone, Deserialize)]
struct InstrumentSpec {
    key: InstrumentKey,
    provider_symbol: String,
    #[serde(default)]
    currencies: Vec<Currency>,
    asset_class: AssetClass,
    #[serde(default)]
    session: Option<String>,
}

impl TryFrom<InstrumentSpec> for Instrument {
    type Error = CandlewickError;

    fn try_from(s: InstrumentSpec) -> Result<Self, Self::Error> {
        Self::new(
            s.key,
            s.provider_symbol,
            s.currencies,
            s.asset_class,
            s.session,
        )
    }
}

impl Instrument {
    /// Build an instrument.
    ///
    /// # Errors
    /// Returns `CandlewickError::InvalidArg` if the key or provider symbol is
    /// empty, or if more than two currencies are given.
    pub fn new(
        key: impl Into<InstrumentKey>,
        provider_symbol: impl Into<String>,
        currencies: Vec<Currency>,
        asset_class: AssetClass,
        session: Option<String>,
    ) -> Result<Self, CandlewickError> {
        let key = key.into();
        let provider_symbol = provider_symbol.into();
        if key.as_str().is_empty() {
            return Err(CandlewickError::InvalidArg("instrument key is empty".into()));
        }
        if provider_symbol.trim().is_empty() {
            return Err(CandlewickError::InvalidArg(format!(
                "instrument {key} has an empty provider symbol"
            )));
        }
        if currencies.len() > 2 {
            return Err(CandlewickError::InvalidArg(format!(
                "instrument {key} lists {} currencies; at most two are allowed",
                currencies.len()
            )));
        }
        Ok(Self {
            key,
            provider_symbol,
            currencies,
            asset_class,
            session,
        })
    }

    /// Internal key.
    #[must_use]
    pub const fn key(&self) -> &InstrumentKey {
        &self.key
    }

    /// Symbol passed to the external source.
    #[must_use]
    pub fn provider_symbol(&self) -> &str {
        &self.provider_symbol
    }

    /// Currency exposure (zero, one, or two codes).
    #[must_use]
    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    /// Asset class.
    #[must_use]
    pub const fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    /// Name of the session profile, if one is assigned.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// True for two-currency instruments, which get the FX weekend fallback.
    #[must_use]
    pub const fn is_fx_like(&self) -> bool {
        self.currencies.len() == 2
    }
}
