use std::collections::BTreeMap;

use crate::instrument::Instrument;
use crate::session::{SessionCalendar, profiles};
use crate::types::{AssetClass, Currency};
use crate::{CandlewickError, InstrumentKey};

/// The fixed universe of instruments, keyed and iterated in key order.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    by_key: BTreeMap<InstrumentKey, Instrument>,
}

impl InstrumentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument.
    ///
    /// # Errors
    /// Returns `CandlewickError::InvalidArg` if the key is already registered.
    pub fn register(&mut self, instrument: Instrument) -> Result<(), CandlewickError> {
        if self.by_key.contains_key(instrument.key()) {
            return Err(CandlewickError::InvalidArg(format!(
                "instrument {} is already registered",
                instrument.key()
            )));
        }
        self.by_key.insert(instrument.key().clone(), instrument);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    /// Returns `CandlewickError::InvalidArg` if the key is already registered.
    pub fn with(mut self, instrument: Instrument) -> Result<Self, CandlewickError> {
        self.register(instrument)?;
        Ok(self)
    }

    /// Parse a JSON array of instrument definitions.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` for malformed input or duplicate keys.
    pub fn from_json(json: &str) -> Result<Self, CandlewickError> {
        let list: Vec<Instrument> =
            serde_json::from_str(json).map_err(|e| CandlewickError::Config(e.to_string()))?;
        let mut reg = Self::new();
        for inst in list {
            reg.register(inst)
                .map_err(|e| CandlewickError::Config(e.to_string()))?;
        }
        Ok(reg)
    }

    /// Look up an instrument by key.
    #[must_use]
    pub fn get(&self, key: &InstrumentKey) -> Option<&Instrument> {
        self.by_key.get(key)
    }

    /// Look up an instrument, failing with `NotFound`.
    ///
    /// # Errors
    /// Returns `CandlewickError::NotFound` for unknown keys.
    pub fn require(&self, key: &InstrumentKey) -> Result<&Instrument, CandlewickError> {
        self.get(key)
            .ok_or_else(|| CandlewickError::not_found(format!("instrument {key}")))
    }

    /// Instruments in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.by_key.values()
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Verify that every session reference resolves in `calendar`.
    ///
    /// Instruments without a profile that are not FX-like are classified as
    /// always open; they are accepted but logged.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` naming the first dangling reference.
    pub fn check_sessions(&self, calendar: &SessionCalendar) -> Result<(), CandlewickError> {
        for inst in self.iter() {
            match inst.session() {
                Some(name) if calendar.profile(name).is_none() => {
                    return Err(CandlewickError::Config(format!(
                        "instrument {} references unknown session profile '{name}'",
                        inst.key()
                    )));
                }
                None if !inst.is_fx_like() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        instrument = %inst.key(),
                        "no session profile and no fallback class; treated as always open"
                    );
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The collector's default universe: 22 FX pairs plus metals, energy,
    /// index futures, SPY, crypto, the dollar index, and VIX.
    ///
    /// # Errors
    /// Only fails if a built-in definition is invalid.
    pub fn standard() -> Result<Self, CandlewickError> {
        const FX_PAIRS: [&str; 22] = [
            "eurusd", "gbpusd", "usdjpy", "usdchf", "audusd", "usdcad", "nzdusd", "eurgbp",
            "eurjpy", "gbpjpy", "chfjpy", "gbpchf", "euraud", "eurcad", "gbpaud", "gbpcad",
            "eurchf", "audcad", "nzdcad", "audchf", "audjpy", "audnzd",
        ];
        let others: [(&str, &str, AssetClass, Option<&str>); 11] = [
            ("xauusd", "GC=F", AssetClass::Metal, Some(profiles::CME)),
            ("xagusd", "SI=F", AssetClass::Metal, Some(profiles::CME)),
            ("copper", "HG=F", AssetClass::Metal, Some(profiles::CME)),
            ("oil", "CL=F", AssetClass::Energy, Some(profiles::CME)),
            ("xngusd", "NG=F", AssetClass::Energy, Some(profiles::CME)),
            ("us100", "NQ=F", AssetClass::Index, Some(profiles::CME)),
            ("spy", "SPY", AssetClass::Equity, Some(profiles::US_EQUITY)),
            ("btcusd", "BTC-USD", AssetClass::Crypto, Some(profiles::CRYPTO)),
            ("ethusd", "ETH-USD", AssetClass::Crypto, Some(profiles::CRYPTO)),
            ("dxy", "DX-Y.NYB", AssetClass::Index, None),
            ("vix", "^VIX", AssetClass::Index, None),
        ];

        let mut reg = Self::new();
        for pair in FX_PAIRS {
            let currencies = vec![Currency::new(&pair[..3])?, Currency::new(&pair[3..])?];
            reg.register(Instrument::new(
                pair,
                format!("{}=X", pair.to_ascii_uppercase()),
                currencies,
                AssetClass::Forex,
                Some(profiles::FX.to_string()),
            )?)?;
        }
        let usd = Currency::new("USD")?;
        for (key, symbol, class, session) in others {
            reg.register(Instrument::new(
                key,
                symbol,
                vec![usd.clone()],
                class,
                session.map(str::to_string),
            )?)?;
        }
        Ok(reg)
    }
}
