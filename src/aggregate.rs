//! Grouping and summation of roaming records.
//!
//! One polars lazy plan serves every place that sums minutes by identity:
//! the daily history write (grouped by adapter, driver and key), the
//! cross-day aggregator (grouped by key, with denylist and thresholds) and
//! the per-account report (grouped by account as well).

use crate::artifacts::{write_csv_with_headers, write_json};
use crate::config::AggregateConfig;
use crate::constants::columns::*;
use crate::error::{Result, RoamingError};
use crate::history::{discover_history_files, history_pattern, read_history_file};
use crate::models::{
    AggregatedRecord, AggregatedRow, GoodRoamingFormula, RoamingRecord, aggregated_headers, round1,
};
use colored::*;
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Identity columns a set of records is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Adapter-driver key only; adapter and driver keep their first value
    AdapterDriver,
    /// Adapter, driver and adapter-driver key
    AdapterAndDriver,
    /// Account plus adapter, driver and adapter-driver key
    Account,
}

impl GroupKey {
    fn columns(&self) -> &'static [&'static str] {
        match self {
            GroupKey::AdapterDriver => &[ADAPTER_DRIVER],
            GroupKey::AdapterAndDriver => &[ADAPTER, DRIVER, ADAPTER_DRIVER],
            GroupKey::Account => &[ACCOUNT_NAME, ADAPTER, DRIVER, ADAPTER_DRIVER],
        }
    }
}

/// What to group by, how to score, and what to drop
#[derive(Debug, Clone)]
pub struct AggregationSpec {
    pub group: GroupKey,
    pub formula: GoodRoamingFormula,
    /// Groups with fewer total minutes are dropped
    pub min_total: Option<i64>,
    /// Groups scoring exactly 0% are dropped
    pub drop_zero: bool,
    /// Sort by percentage descending instead of ascending
    pub descending: bool,
}

impl AggregationSpec {
    pub fn new(group: GroupKey, formula: GoodRoamingFormula) -> Self {
        Self {
            group,
            formula,
            min_total: None,
            drop_zero: false,
            descending: false,
        }
    }

    pub fn with_min_total(mut self, min_total: i64) -> Self {
        self.min_total = Some(min_total);
        self
    }

    pub fn with_drop_zero(mut self, drop_zero: bool) -> Self {
        self.drop_zero = drop_zero;
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

/// Group, sum, score, filter and sort `records`
pub fn aggregate_records(
    records: &[RoamingRecord],
    spec: &AggregationSpec,
) -> Result<Vec<AggregatedRecord>> {
    let frame = records_frame(records)?;
    let group_cols = spec.group.columns();

    let mut aggs = vec![
        col(GOOD_SUM).sum(),
        col(CRITICAL_SUM).sum(),
        col(WARNING_SUM).sum(),
        col(CLIENT_COUNT).sum(),
    ];
    for name in [ACCOUNT_NAME, ADAPTER, DRIVER] {
        if !group_cols.contains(&name) {
            aggs.push(col(name).first());
        }
    }

    let by: Vec<Expr> = group_cols.iter().map(|c| col(*c)).collect();
    let mut lf = frame
        .lazy()
        .group_by_stable(by)
        .agg(aggs)
        .with_column((col(GOOD_SUM) + col(CRITICAL_SUM) + col(WARNING_SUM)).alias(TOTAL_SUM))
        .with_column(percentage_expr(spec.formula).alias(GOOD_PCT));

    if let Some(min_total) = spec.min_total {
        lf = lf.filter(col(TOTAL_SUM).gt_eq(lit(min_total)));
    }

    let df = lf
        .sort_by_exprs(
            [col(GOOD_PCT), col(ADAPTER_DRIVER)],
            SortMultipleOptions::default().with_order_descending_multi([spec.descending, false]),
        )
        .collect()?;

    let mut groups = frame_records(&df)?;
    if spec.drop_zero {
        // Compared at the precision the percentage is written with
        groups.retain(|g| round1(g.good_pct) != 0.0);
    }
    debug!(
        "Aggregated {} records into {} groups ({:?})",
        records.len(),
        groups.len(),
        spec.group
    );
    Ok(groups)
}

/// Percentage of good roaming; 100 when a group has no minutes
fn percentage_expr(formula: GoodRoamingFormula) -> Expr {
    let total = col(TOTAL_SUM).cast(DataType::Float64);
    let score = match formula {
        GoodRoamingFormula::GoodOverTotal => {
            col(GOOD_SUM).cast(DataType::Float64) / total * lit(100.0)
        }
        GoodRoamingFormula::NonCritical => {
            (lit(1.0) - col(CRITICAL_SUM).cast(DataType::Float64) / total) * lit(100.0)
        }
    };
    when(col(TOTAL_SUM).gt(lit(0i64)))
        .then(score)
        .otherwise(lit(100.0))
}

fn records_frame(records: &[RoamingRecord]) -> Result<DataFrame> {
    let accounts: Vec<Option<String>> = records.iter().map(|r| r.account_name.clone()).collect();
    let adapters: Vec<String> = records.iter().map(|r| r.adapter.clone()).collect();
    let drivers: Vec<String> = records.iter().map(|r| r.driver.clone()).collect();
    let keys: Vec<String> = records.iter().map(|r| r.adapter_driver.clone()).collect();
    let good: Vec<i64> = records.iter().map(|r| r.good_sum).collect();
    let critical: Vec<i64> = records.iter().map(|r| r.critical_sum).collect();
    let warning: Vec<i64> = records.iter().map(|r| r.warning_sum).collect();
    let clients: Vec<i64> = records.iter().map(|r| r.client_count).collect();

    Ok(df!(
        ACCOUNT_NAME => accounts,
        ADAPTER => adapters,
        DRIVER => drivers,
        ADAPTER_DRIVER => keys,
        GOOD_SUM => good,
        CRITICAL_SUM => critical,
        WARNING_SUM => warning,
        CLIENT_COUNT => clients,
    )?)
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    Ok(df.column(name)?.as_materialized_series())
}

fn frame_records(df: &DataFrame) -> Result<Vec<AggregatedRecord>> {
    let accounts = series(df, ACCOUNT_NAME)?.str()?;
    let adapters = series(df, ADAPTER)?.str()?;
    let drivers = series(df, DRIVER)?.str()?;
    let keys = series(df, ADAPTER_DRIVER)?.str()?;
    let good = series(df, GOOD_SUM)?.i64()?;
    let critical = series(df, CRITICAL_SUM)?.i64()?;
    let warning = series(df, WARNING_SUM)?.i64()?;
    let clients = series(df, CLIENT_COUNT)?.i64()?;
    let total = series(df, TOTAL_SUM)?.i64()?;
    let pct = series(df, GOOD_PCT)?.f64()?;

    Ok((0..df.height())
        .map(|i| AggregatedRecord {
            account_name: accounts.get(i).map(str::to_string),
            adapter: adapters.get(i).unwrap_or_default().to_string(),
            driver: drivers
                .get(i)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            adapter_driver: keys.get(i).unwrap_or_default().to_string(),
            good_sum: good.get(i).unwrap_or(0),
            critical_sum: critical.get(i).unwrap_or(0),
            warning_sum: warning.get(i).unwrap_or(0),
            client_count: clients.get(i).unwrap_or(0),
            total_sum: total.get(i).unwrap_or(0),
            good_pct: pct.get(i).unwrap_or(100.0),
        })
        .collect())
}

/// Drop rows whose key or driver is on the denylist
pub fn apply_denylist(records: Vec<RoamingRecord>, config: &AggregateConfig) -> Vec<RoamingRecord> {
    let before = records.len();
    let kept: Vec<RoamingRecord> = records
        .into_iter()
        .filter(|r| !config.is_denied(&r.adapter_driver) && !config.is_denied_driver(&r.driver))
        .collect();
    debug!("Denylist removed {} of {} rows", before - kept.len(), before);
    kept
}

/// Cross-day aggregation of already-loaded records
pub fn aggregate_fleet(
    records: Vec<RoamingRecord>,
    config: &AggregateConfig,
) -> Result<Vec<AggregatedRecord>> {
    let records = apply_denylist(records, config);
    let spec = AggregationSpec::new(GroupKey::AdapterDriver, config.formula)
        .with_min_total(config.min_total_minutes)
        .with_drop_zero(config.drop_zero_percentage);
    aggregate_records(&records, &spec)
}

/// Summary of one aggregator run
#[derive(Debug, Clone)]
pub struct AggregateSummary {
    pub files_read: usize,
    pub files_failed: usize,
    pub rows_in: usize,
    pub groups_out: usize,
    pub output_path: PathBuf,
}

/// Read every history file, aggregate, write the aggregated table
///
/// Returns `Ok(None)` without writing anything when the history directory
/// holds no matching files.
pub fn aggregate_history(
    history_dir: &Path,
    output_path: &Path,
    config: &AggregateConfig,
) -> Result<Option<AggregateSummary>> {
    let files = discover_history_files(history_dir)?;
    if files.is_empty() {
        warn!(
            "No history files matching {} - aggregated output not written",
            history_pattern(history_dir)
        );
        return Ok(None);
    }

    let mut records = Vec::new();
    let mut files_failed = 0;
    for file in &files {
        match read_history_file(file) {
            Ok(rows) => {
                info!("Loaded: {} ({} rows)", file.display(), rows.len());
                records.extend(rows.into_iter().map(|r| r.into_record()));
            }
            Err(e) => {
                warn!("Error reading {}: {}", file.display(), e);
                files_failed += 1;
            }
        }
    }

    if files_failed == files.len() {
        return Err(RoamingError::MissingInput {
            path: history_dir.to_path_buf(),
        });
    }

    let rows_in = records.len();
    let aggregated = aggregate_fleet(records, config)?;
    let rows: Vec<AggregatedRow> = aggregated.iter().map(Into::into).collect();
    write_csv_with_headers(output_path, &aggregated_headers(), &rows)?;

    println!(
        "  {} {} groups from {} history files -> {}",
        "Aggregated".bright_green(),
        rows.len().to_string().bright_white().bold(),
        files.len(),
        output_path.display()
    );

    Ok(Some(AggregateSummary {
        files_read: files.len() - files_failed,
        files_failed,
        rows_in,
        groups_out: rows.len(),
        output_path: output_path.to_path_buf(),
    }))
}

/// Total critical minutes across the history, broken into calendar units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalMinutesSummary {
    pub total_minutes: i64,
    pub years: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl CriticalMinutesSummary {
    const MINUTES_PER_DAY: i64 = 24 * 60;
    const MINUTES_PER_YEAR: i64 = 365 * Self::MINUTES_PER_DAY;

    pub fn from_total(total_minutes: i64) -> Self {
        let years = total_minutes / Self::MINUTES_PER_YEAR;
        let rest = total_minutes % Self::MINUTES_PER_YEAR;
        let days = rest / Self::MINUTES_PER_DAY;
        let rest = rest % Self::MINUTES_PER_DAY;
        Self {
            total_minutes,
            years,
            days,
            hours: rest / 60,
            minutes: rest % 60,
        }
    }
}

/// Sum `Critical Sum` over every history file and write the JSON summary
pub fn summarize_critical_minutes(
    history_dir: &Path,
    output_path: &Path,
) -> Result<Option<CriticalMinutesSummary>> {
    let files = discover_history_files(history_dir)?;
    if files.is_empty() {
        warn!(
            "No history files matching {} - critical minutes summary not written",
            history_pattern(history_dir)
        );
        return Ok(None);
    }

    let mut total = 0i64;
    for file in &files {
        match read_history_file(file) {
            Ok(rows) => total += rows.iter().map(|r| r.critical_sum).sum::<i64>(),
            Err(e) => warn!("Error reading {}: {}", file.display(), e),
        }
    }

    let summary = CriticalMinutesSummary::from_total(total);
    write_json(output_path, &summary)?;
    println!(
        "  {} {} critical minutes ({} years, {} days, {} hours, {} minutes)",
        "Total".bright_green(),
        summary.total_minutes.to_string().bright_white().bold(),
        summary.years,
        summary.days,
        summary.hours,
        summary.minutes
    );
    Ok(Some(summary))
}
