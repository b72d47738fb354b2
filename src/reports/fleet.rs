//! Fleet-wide summary: manufacturer share and total sample count.

use crate::artifacts::{read_csv, write_csv};
use crate::error::Result;
use crate::models::MergedRow;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const MANUFACTURER: &str = "Manufacturer";
const COUNT: &str = "Count";
const PERCENTAGE: &str = "Percentage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerShare {
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Percentage")]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalSamples {
    #[serde(rename = "Total Sum")]
    pub total_sum: i64,
}

/// First word of the key with `(R)` and `®` removed
pub fn manufacturer_of(adapter_driver: &str) -> String {
    adapter_driver
        .split_whitespace()
        .next()
        .map(|word| word.replace("(R)", "").replace('®', ""))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Share of rows per manufacturer, largest first
pub fn manufacturer_shares(rows: &[MergedRow]) -> Result<Vec<ManufacturerShare>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let total = rows.len() as f64;
    let frame = df!(
        MANUFACTURER => rows.iter().map(|r| manufacturer_of(&r.adapter_driver)).collect::<Vec<_>>(),
    )?;

    let shares = frame
        .lazy()
        .group_by([col(MANUFACTURER)])
        .agg([len().cast(DataType::Int64).alias(COUNT)])
        .with_column((col(COUNT).cast(DataType::Float64) / lit(total) * lit(100.0)).alias(PERCENTAGE))
        .sort_by_exprs(
            [col(COUNT), col(MANUFACTURER)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;

    let names = shares.column(MANUFACTURER)?.as_materialized_series().str()?;
    let pcts = shares.column(PERCENTAGE)?.as_materialized_series().f64()?;
    Ok((0..shares.height())
        .map(|i| ManufacturerShare {
            manufacturer: names.get(i).unwrap_or_default().to_string(),
            percentage: pcts.get(i).unwrap_or(0.0),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct FleetSummary {
    pub manufacturers: Vec<ManufacturerShare>,
    pub total_samples: i64,
}

/// Write `manufacturers.csv` and `total_samples.csv` from the merged table
pub fn fleet_summary(
    merged_csv: &Path,
    manufacturers_path: &Path,
    total_samples_path: &Path,
) -> Result<FleetSummary> {
    let rows: Vec<MergedRow> = read_csv(merged_csv)?;
    let manufacturers = manufacturer_shares(&rows)?;
    let total_samples = rows.iter().map(|r| r.total_sum).sum();

    write_csv(manufacturers_path, &manufacturers)?;
    write_csv(
        total_samples_path,
        &[TotalSamples {
            total_sum: total_samples,
        }],
    )?;
    info!(
        "Fleet summary: {} manufacturers, {} total samples",
        manufacturers.len(),
        total_samples
    );
    Ok(FleetSummary {
        manufacturers,
        total_samples,
    })
}
