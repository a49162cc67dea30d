use async_trait::async_trait;

use crate::types::{Bar, FetchRequest, ProviderLimits};
use crate::{CandlewickError, Timeframe};

/// An external source of OHLCV bars.
///
/// Implementations translate a [`FetchRequest`] into whatever wire protocol
/// the source speaks. Returned bars carry UTC timestamps (naive source
/// timestamps are taken as UTC) and are ordered ascending. An empty answer
/// is reported as [`CandlewickError::NoData`] rather than `Ok(vec![])`.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// A stable identifier used in errors and logs (e.g. "yahoo", "mock").
    fn name(&self) -> &'static str;

    /// Human-friendly vendor string.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Whether the source serves `timeframe` natively.
    ///
    /// Timeframes it does not serve are synthesized by resampling a finer
    /// one, when possible.
    fn supports(&self, timeframe: Timeframe) -> bool;

    /// Per-request bar cap and retention horizon for `timeframe`.
    fn limits(&self, timeframe: Timeframe) -> ProviderLimits;

    /// Fetch bars for `symbol`.
    async fn fetch(&self, symbol: &str, req: FetchRequest) -> Result<Vec<Bar>, CandlewickError>;
}
