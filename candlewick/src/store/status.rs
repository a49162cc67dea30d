use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use candlewick_core::{CandlewickError, InstrumentKey, ReconciliationMarker, Timeframe};
use chrono::{DateTime, Utc};

use super::write_atomic;

/// Last update per instrument and timeframe.
pub type StatusMap = BTreeMap<InstrumentKey, BTreeMap<Timeframe, DateTime<Utc>>>;

/// On-disk shape: `{ "<instrument>": { "<timeframe label>": "<RFC 3339>" } }`.
type StatusDoc = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;

/// The status record: when each series was last successfully updated.
///
/// Updates are kept in memory and written out by [`flush`](Self::flush),
/// which replaces the file atomically.
#[derive(Debug)]
pub struct StatusStore {
    path: PathBuf,
    entries: Mutex<StatusMap>,
}

impl StatusStore {
    /// Load the record at `path`. A missing file starts an empty record.
    ///
    /// # Errors
    /// Returns `CandlewickError::Persistence` if the file exists but cannot
    /// be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CandlewickError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => StatusMap::new(),
            Ok(raw) => parse(&path, &raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StatusMap::new(),
            Err(e) => return Err(CandlewickError::persistence(&path, e)),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// File backing the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StatusMap> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Note a successful update.
    pub fn record(&self, marker: &ReconciliationMarker) {
        self.lock()
            .entry(marker.instrument.clone())
            .or_default()
            .insert(marker.timeframe, marker.updated_at);
    }

    /// Last update of one series.
    #[must_use]
    pub fn get(&self, key: &InstrumentKey, timeframe: Timeframe) -> Option<DateTime<Utc>> {
        self.lock()
            .get(key)
            .and_then(|by_tf| by_tf.get(&timeframe))
            .copied()
    }

    /// A copy of the whole record.
    #[must_use]
    pub fn snapshot(&self) -> StatusMap {
        self.lock().clone()
    }

    /// Forget one timeframe of an instrument, or all of them when
    /// `timeframe` is `None`. Returns whether anything was removed.
    pub fn remove(&self, key: &InstrumentKey, timeframe: Option<Timeframe>) -> bool {
        let mut entries = self.lock();
        match timeframe {
            None => entries.remove(key).is_some(),
            Some(tf) => {
                let Some(by_tf) = entries.get_mut(key) else {
                    return false;
                };
                let removed = by_tf.remove(&tf).is_some();
                if by_tf.is_empty() {
                    entries.remove(key);
                }
                removed
            }
        }
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Persist the record.
    ///
    /// # Errors
    /// Returns `CandlewickError::Persistence` if the file cannot be written;
    /// the previous file is left intact in that case.
    pub async fn flush(&self) -> Result<(), CandlewickError> {
        let doc: StatusDoc = self
            .lock()
            .iter()
            .map(|(key, by_tf)| {
                let inner = by_tf
                    .iter()
                    .map(|(tf, at)| (tf.label().to_string(), *at))
                    .collect();
                (key.as_str().to_string(), inner)
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| CandlewickError::persistence(&self.path, e))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, |f| f.write_all(&bytes)))
            .await
            .map_err(|e| CandlewickError::Other(format!("status flush task failed: {e}")))?
    }
}

fn parse(path: &Path, raw: &str) -> Result<StatusMap, CandlewickError> {
    let doc: StatusDoc =
        serde_json::from_str(raw).map_err(|e| CandlewickError::persistence(path, e))?;
    let mut out = StatusMap::new();
    for (key, by_tf) in doc {
        let slot = out.entry(InstrumentKey::new(&key)).or_default();
        for (label, at) in by_tf {
            let tf = Timeframe::from_str(&label)
                .map_err(|e| CandlewickError::persistence(path, e))?;
            slot.insert(tf, at);
        }
    }
    Ok(out)
}
