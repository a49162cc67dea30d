use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use candlewick_core::types::Bar;
use candlewick_core::{CandlewickError, InstrumentKey, SeriesStore, Timeframe};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::write_atomic;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADER: [&str; 6] = ["Datetime", "Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Datetime")]
    datetime: String,
    #[serde(rename = "Open")]
    open: String,
    #[serde(rename = "High")]
    high: String,
    #[serde(rename = "Low")]
    low: String,
    #[serde(rename = "Close")]
    close: String,
    #[serde(rename = "Volume")]
    volume: u64,
}

impl From<&Bar> for CsvRow {
    fn from(b: &Bar) -> Self {
        Self {
            datetime: b.ts.format(TS_FORMAT).to_string(),
            open: b.open.to_string(),
            high: b.high.to_string(),
            low: b.low.to_string(),
            close: b.close.to_string(),
            volume: b.volume,
        }
    }
}

impl CsvRow {
    fn into_bar(self) -> Result<Bar, String> {
        let ts = NaiveDateTime::parse_from_str(&self.datetime, TS_FORMAT)
            .map_err(|e| format!("bad Datetime '{}': {e}", self.datetime))?
            .and_utc();
        let px = |s: &str| Decimal::from_str(s).map_err(|e| format!("bad price '{s}': {e}"));
        Ok(Bar::new(
            ts,
            px(&self.open)?,
            px(&self.high)?,
            px(&self.low)?,
            px(&self.close)?,
            self.volume,
        ))
    }
}

/// One CSV file per series at `<root>/<timeframe>/<instrument>.csv`.
///
/// Columns are `Datetime,Open,High,Low,Close,Volume` with UTC timestamps
/// formatted as `YYYY-MM-DD HH:MM:SS`. Rows are written in ascending time
/// order. Writes go through a `.csv.tmp` sibling that is renamed into place.
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    root: PathBuf,
}

impl CsvSeriesStore {
    /// A store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding one series.
    #[must_use]
    pub fn path_for(&self, key: &InstrumentKey, timeframe: Timeframe) -> PathBuf {
        self.root
            .join(timeframe.label())
            .join(format!("{}.csv", key.as_str()))
    }
}

fn read_series(path: &Path) -> Result<Vec<Bar>, CandlewickError> {
    let mut reader = match ::csv::Reader::from_path(path) {
        Ok(r) => r,
        Err(e)
            if matches!(e.kind(), ::csv::ErrorKind::Io(err) if err.kind() == ErrorKind::NotFound) =>
        {
            return Ok(Vec::new());
        }
        Err(e) => return Err(CandlewickError::persistence(path, e)),
    };
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| CandlewickError::persistence(path, e))?;
        let bar = row
            .into_bar()
            .map_err(|msg| CandlewickError::persistence(path, format!("row {}: {msg}", i + 1)))?;
        bars.push(bar);
    }
    Ok(bars)
}

fn write_series(path: &Path, bars: &[Bar]) -> Result<(), CandlewickError> {
    write_atomic(path, |file| {
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADER).map_err(io::Error::other)?;
        for bar in bars {
            writer.serialize(CsvRow::from(bar)).map_err(io::Error::other)?;
        }
        writer.flush()
    })
}

fn list_keys(dir: &Path) -> Result<Vec<InstrumentKey>, CandlewickError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CandlewickError::persistence(dir, e)),
    };
    let mut keys = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CandlewickError::persistence(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "csv")
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            keys.push(InstrumentKey::new(stem));
        }
    }
    keys.sort();
    Ok(keys)
}

async fn blocking<T, F>(f: F) -> Result<T, CandlewickError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CandlewickError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CandlewickError::Other(format!("store task failed: {e}")))?
}

#[async_trait]
impl SeriesStore for CsvSeriesStore {
    async fn load(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, CandlewickError> {
        let path = self.path_for(key, timeframe);
        blocking(move || read_series(&path)).await
    }

    async fn replace(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<(), CandlewickError> {
        let path = self.path_for(key, timeframe);
        let mut bars = bars.to_vec();
        bars.sort_by_key(|b| b.ts);
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), rows = bars.len(), "writing series");
        blocking(move || write_series(&path, &bars)).await
    }

    async fn reset(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
    ) -> Result<bool, CandlewickError> {
        let path = self.path_for(key, timeframe);
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CandlewickError::persistence(&path, e)),
        })
        .await
    }

    async fn keys(&self, timeframe: Timeframe) -> Result<Vec<InstrumentKey>, CandlewickError> {
        let dir = self.root.join(timeframe.label());
        blocking(move || list_keys(&dir)).await
    }
}
