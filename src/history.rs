//! Dated fetch history.
//!
//! The daily fetch writes `roaming_data_<YYYY-MM-DD>.csv` into the history
//! directory; re-running on the same day overwrites that day's file. The
//! aggregator and the critical-minutes summary read every matching file.

use crate::artifacts::{read_csv, write_csv};
use crate::constants::{HISTORY_DATE_FORMAT, HISTORY_FILE_PREFIX};
use crate::error::{Result, RoamingError};
use crate::models::{AggregatedRecord, HistoryRow};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path of the history file for `date`
pub fn history_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}_{}.csv",
        HISTORY_FILE_PREFIX,
        date.format(HISTORY_DATE_FORMAT)
    ))
}

/// Glob pattern matching every history file in `dir`
pub fn history_pattern(dir: &Path) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}*.csv", escaped, HISTORY_FILE_PREFIX)
}

/// All history files in `dir`, sorted by name (and therefore by date)
pub fn discover_history_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = history_pattern(dir);
    debug!("Searching for history files with pattern: {}", pattern);

    let paths = glob::glob(&pattern).map_err(|e| {
        RoamingError::configuration(format!("Invalid history pattern '{}': {}", pattern, e))
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable history entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Write one day's grouped rows
pub fn write_history_file(path: &Path, records: &[AggregatedRecord]) -> Result<usize> {
    let rows: Vec<HistoryRow> = records.iter().map(HistoryRow::from_aggregated).collect();
    write_csv(path, &rows)
}

pub fn read_history_file(path: &Path) -> Result<Vec<HistoryRow>> {
    read_csv(path)
}
