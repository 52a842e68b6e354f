//! JSON document storage -- run history, alert history, daily logs.
//!
//! Every document is read and written whole. Writes go to a sibling temp file
//! and are renamed into place; there is no locking, so the last writer wins.

pub mod alert_log;
pub mod history;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub use self::alert_log::{AlertHistory, AlertLog};
pub use self::history::{success_rate, MetricsStore, RunHistory, RunRecord, SuiteCounts};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metrics unavailable: {} does not exist (run `healwatch monitor` first)", .path.display())]
    Unavailable { path: PathBuf },

    #[error("metrics corrupt: {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid run record: {0}")]
    InvalidRecord(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and parse a JSON document. A missing file is `Unavailable`, a file that
/// does not parse into `T` is `Corrupt`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::Unavailable {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `value` as pretty JSON, replacing the whole document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Append `value` to the JSON array stored at `path`, creating it if needed.
/// An unreadable array is replaced rather than merged. Returns the new length.
pub fn append_json_array<T: Serialize>(path: &Path, value: &T) -> Result<usize, StoreError> {
    let mut entries: Vec<serde_json::Value> = match read_json(path) {
        Ok(v) => v,
        Err(StoreError::Unavailable { .. }) => Vec::new(),
        Err(StoreError::Corrupt { reason, .. }) => {
            warn!(path = %path.display(), %reason, "existing array document unreadable, starting fresh");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    entries.push(serde_json::to_value(value)?);
    write_json(path, &entries)?;
    Ok(entries.len())
}

/// Append one line of text to `path`.
pub fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    writeln!(file, "{line}").map_err(|e| StoreError::io(path, e))
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    Ok(())
}
