//! Flat-file artifact helpers.
//!
//! Every stage hands its output to the next one as a CSV or JSON file.
//! These helpers keep header handling, parent directory creation and
//! missing-input reporting identical across stages.

use crate::error::{Result, RoamingError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Create the parent directory of `path` if needed
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Serialize rows to a CSV file with a header line, overwriting it
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Like `write_csv`, but an empty table still gets its header line
pub fn write_csv_with_headers<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<usize> {
    if !rows.is_empty() {
        return write_csv(path, rows);
    }
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    writer.flush()?;
    debug!("Wrote header-only table to {}", path.display());
    Ok(0)
}

/// Deserialize every row of a headed CSV file
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(RoamingError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Pretty-print a value to a JSON file, overwriting it
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    debug!("Wrote JSON to {}", path.display());
    Ok(())
}
