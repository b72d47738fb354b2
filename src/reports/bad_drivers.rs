//! Per-account bad-driver files.
//!
//! Recent per-account data is fetched fresh, grouped by account and
//! adapter-driver, scored, and every group under the bad threshold goes
//! into that account's CSV.

use crate::aggregate::{AggregationSpec, GroupKey, aggregate_records};
use crate::artifacts::write_csv;
use crate::config::RoamingConfig;
use crate::constants::BAD_DRIVERS_FILE_PREFIX;
use crate::error::Result;
use crate::fetcher::{FetchStats, KeyCleaner, RoamingApi, RoamingFetcher};
use crate::models::{AggregatedRecord, BadDriverRow, Credential, TimeWindow, round1};
use chrono::{DateTime, Local};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Keep alphanumerics, `_` and `-`; everything else becomes `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn bad_drivers_file_path(dir: &Path, account: &str) -> PathBuf {
    dir.join(format!(
        "{}{}.csv",
        BAD_DRIVERS_FILE_PREFIX,
        sanitize_filename(account)
    ))
}

/// Rows below `threshold`, rounded and sorted ascending
pub fn bad_driver_rows(records: &[AggregatedRecord], threshold: f64) -> Vec<BadDriverRow> {
    let mut rows: Vec<BadDriverRow> = records
        .iter()
        .map(|r| BadDriverRow {
            account_name: r.account_name.clone().unwrap_or_default(),
            adapter: r.adapter.trim().to_lowercase(),
            driver: r.driver.clone().unwrap_or_default(),
            adapter_driver: r.adapter_driver.clone(),
            critical_minutes: r.critical_sum,
            client_count: r.client_count,
            total_minutes: r.total_sum,
            good_pct: round1(r.good_pct),
        })
        .filter(|r| r.good_pct < threshold)
        .collect();
    rows.sort_by(|a, b| a.good_pct.total_cmp(&b.good_pct));
    rows
}

/// Rows grouped by account, accounts in first-seen order
pub fn split_by_account(rows: Vec<BadDriverRow>) -> Vec<(String, Vec<BadDriverRow>)> {
    let mut accounts: Vec<(String, Vec<BadDriverRow>)> = Vec::new();
    for row in rows {
        match accounts.iter_mut().find(|(name, _)| *name == row.account_name) {
            Some((_, group)) => group.push(row),
            None => accounts.push((row.account_name.clone(), vec![row])),
        }
    }
    accounts
}

fn remove_stale_files(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_report = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(BAD_DRIVERS_FILE_PREFIX) && n.ends_with(".csv"));
        if is_report {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, Clone)]
pub struct BadDriversReport {
    pub fetch: FetchStats,
    pub bad_rows: usize,
    pub files: Vec<PathBuf>,
}

/// Fetch the last `window_days` per account and write one CSV per account
/// with bad drivers
pub async fn find_bad_drivers<A: RoamingApi>(
    api: &A,
    credentials: &[Credential],
    config: &RoamingConfig,
    now: DateTime<Local>,
    show_progress: bool,
) -> Result<BadDriversReport> {
    let reports = &config.reports;
    let window = TimeWindow::last_days(reports.window_days, now);
    debug!("Per-account window: {:?}", window);

    let outcome = RoamingFetcher::new(api, reports.workers)
        .with_window(Some(window))
        .with_key_cleaner(KeyCleaner::new(&config.fetch.key_prefix_pattern)?)
        .tag_accounts()
        .with_progress(show_progress)
        .fetch_all(credentials)
        .await;

    let dir = config.bad_drivers_dir();
    let removed = remove_stale_files(&dir)?;
    if removed > 0 {
        debug!("Removed {} bad-driver files from a previous run", removed);
    }

    if outcome.records.is_empty() {
        warn!("No per-account data collected ({})", outcome.stats.describe());
        return Ok(BadDriversReport {
            fetch: outcome.stats,
            bad_rows: 0,
            files: Vec::new(),
        });
    }

    let spec = AggregationSpec::new(GroupKey::Account, reports.formula);
    let grouped = aggregate_records(&outcome.records, &spec)?;
    let rows = bad_driver_rows(&grouped, reports.bad_threshold);
    let bad_rows = rows.len();

    let mut files = Vec::new();
    for (account, account_rows) in split_by_account(rows) {
        let path = bad_drivers_file_path(&dir, &account);
        write_csv(&path, &account_rows)?;
        println!(
            "  {} {} bad drivers for {} -> {}",
            "✓".green(),
            account_rows.len().to_string().bright_white().bold(),
            account,
            path.display()
        );
        files.push(path);
    }

    info!(
        "{} bad drivers across {} accounts (threshold {}%)",
        bad_rows,
        files.len(),
        reports.bad_threshold
    );
    Ok(BadDriversReport {
        fetch: outcome.stats,
        bad_rows,
        files,
    })
}
