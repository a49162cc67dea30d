//! File-backed persistence: per-series CSV files and the status record.

mod csv;
mod status;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use candlewick_core::CandlewickError;

pub use self::csv::CsvSeriesStore;
pub use status::{StatusMap, StatusStore};

/// Sibling path used while a file is being rewritten.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a file via a temporary sibling and rename it into place.
///
/// Readers see either the previous contents or the new ones. The temporary
/// file is removed if any step fails.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), CandlewickError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CandlewickError::persistence(parent, e))?;
    }
    let tmp = tmp_path(path);
    let result = File::create(&tmp)
        .and_then(|mut f| {
            write(&mut f)?;
            f.flush()?;
            f.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CandlewickError::persistence(path, e)
    })
}
