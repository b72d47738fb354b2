//! Attach driver vintage to the aggregated table.
//!
//! A polars left join on the normalized adapter-driver key. The vintage
//! side is deduplicated first so every aggregated row appears exactly once;
//! rows without a match keep a null vintage. Output order follows the
//! aggregated table.

use crate::artifacts::{read_csv, write_csv_with_headers, write_json};
use crate::constants::columns::*;
use crate::error::Result;
use crate::models::{AggregatedRow, MergedRow, VintageRecord, merged_headers, normalize_key};
use crate::vintage::normalize_vintage_date;
use colored::*;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ROW_ORDER: &str = "__row";

/// Left join of `aggregated` with `vintage`
pub fn merge_vintage(aggregated: &[AggregatedRow], vintage: &[VintageRecord]) -> Result<Vec<MergedRow>> {
    if aggregated.is_empty() {
        return Ok(Vec::new());
    }
    let left = df!(
        ROW_ORDER => (0..aggregated.len() as i64).collect::<Vec<_>>(),
        JOIN_KEY => aggregated.iter().map(|r| normalize_key(&r.adapter_driver)).collect::<Vec<_>>(),
    )?;

    let mut seen = HashSet::new();
    let unique: Vec<&VintageRecord> = vintage
        .iter()
        .filter(|r| seen.insert(normalize_key(&r.adapter_driver)))
        .collect();
    if unique.len() < vintage.len() {
        debug!(
            "Dropped {} duplicate vintage keys before join",
            vintage.len() - unique.len()
        );
    }

    let right = df!(
        JOIN_KEY => unique.iter().map(|r| normalize_key(&r.adapter_driver)).collect::<Vec<_>>(),
        DRIVER_VINTAGE => unique.iter().map(|r| normalize_vintage_date(&r.vintage)).collect::<Vec<_>>(),
    )?;

    let joined = left
        .lazy()
        .left_join(right.lazy(), col(JOIN_KEY), col(JOIN_KEY))
        .sort([ROW_ORDER], SortMultipleOptions::default())
        .collect()?;

    let order = joined.column(ROW_ORDER)?.as_materialized_series().i64()?;
    let vintages = joined
        .column(DRIVER_VINTAGE)?
        .as_materialized_series()
        .str()?;

    let mut merged = Vec::with_capacity(joined.height());
    for i in 0..joined.height() {
        let Some(row) = order.get(i).and_then(|idx| aggregated.get(idx as usize)) else {
            continue;
        };
        merged.push(MergedRow {
            adapter_driver: row.adapter_driver.clone(),
            adapter: row.adapter.clone(),
            good_sum: row.good_sum,
            critical_sum: row.critical_sum,
            warning_sum: row.warning_sum,
            client_count: row.client_count,
            total_sum: row.total_sum,
            good_pct: row.good_pct,
            driver_vintage: vintages.get(i).map(str::to_string),
        });
    }
    Ok(merged)
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub rows: usize,
    pub matched: usize,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
}

/// Read both tables, join, and write the CSV and JSON forms
pub fn merge_files(
    aggregated_path: &Path,
    vintage_path: &Path,
    csv_path: &Path,
    json_path: &Path,
) -> Result<MergeReport> {
    let aggregated: Vec<AggregatedRow> = read_csv(aggregated_path)?;
    let vintage: Vec<VintageRecord> = read_csv(vintage_path)?;
    info!(
        "Merging {} aggregated rows with {} vintage rows",
        aggregated.len(),
        vintage.len()
    );

    let merged = merge_vintage(&aggregated, &vintage)?;
    write_csv_with_headers(csv_path, &merged_headers(), &merged)?;
    write_json(json_path, &merged)?;

    let matched = merged.iter().filter(|r| r.driver_vintage.is_some()).count();
    println!(
        "  {} {} rows ({} with vintage) -> {}",
        "Merged".bright_green(),
        merged.len().to_string().bright_white().bold(),
        matched,
        csv_path.display()
    );

    Ok(MergeReport {
        rows: merged.len(),
        matched,
        csv_path: csv_path.to_path_buf(),
        json_path: json_path.to_path_buf(),
    })
}
