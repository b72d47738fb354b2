//! Concurrent per-account fetch from the monitoring API.
//!
//! Each account is authenticated and queried independently with a bounded
//! number of in-flight accounts. An account whose token exchange or data
//! call fails is logged and left out; it never aborts the others. The
//! fleet-wide daily fetch groups the flattened rows and writes them to the
//! dated history file.

pub mod client;
pub mod flatten;

#[cfg(test)]
mod tests;

pub use client::{AdapterDriversResponse, HttpRoamingApi, RoamingApi};
pub use flatten::{KeyCleaner, flatten_response};

use crate::aggregate::{AggregationSpec, GroupKey, aggregate_records};
use crate::config::RoamingConfig;
use crate::error::Result;
use crate::history::{history_file_path, write_history_file};
use crate::models::{Credential, RoamingRecord, TimeWindow};
use crate::progress::ProgressReporter;
use chrono::NaiveDate;
use colored::*;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Per-account outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Accounts in the credential source
    pub configured: usize,
    /// Accounts that returned at least one row
    pub succeeded: usize,
    /// Accounts that answered with no rows
    pub empty: usize,
    /// Accounts whose auth or data call failed
    pub failed: usize,
}

impl FetchStats {
    pub fn describe(&self) -> String {
        if self.configured == 0 {
            "no accounts configured".to_string()
        } else if self.succeeded == 0 {
            format!("no account returned data ({} configured)", self.configured)
        } else {
            format!(
                "{}/{} accounts returned data ({} empty, {} failed)",
                self.succeeded, self.configured, self.empty, self.failed
            )
        }
    }
}

/// Flattened rows from every account that succeeded
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<RoamingRecord>,
    pub stats: FetchStats,
}

enum AccountResult {
    Rows(Vec<RoamingRecord>),
    Empty,
    Failed,
}

/// Bounded fan-out over accounts
pub struct RoamingFetcher<'a, A> {
    api: &'a A,
    workers: usize,
    window: Option<TimeWindow>,
    cleaner: Option<KeyCleaner>,
    tag_accounts: bool,
    show_progress: bool,
}

impl<'a, A: RoamingApi> RoamingFetcher<'a, A> {
    pub fn new(api: &'a A, workers: usize) -> Self {
        Self {
            api,
            workers: workers.max(1),
            window: None,
            cleaner: None,
            tag_accounts: false,
            show_progress: false,
        }
    }

    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    pub fn with_key_cleaner(mut self, cleaner: KeyCleaner) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    /// Stamp every row with its account name
    pub fn tag_accounts(mut self) -> Self {
        self.tag_accounts = true;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    async fn fetch_account(&self, credential: &Credential) -> Result<Vec<RoamingRecord>> {
        let token = self.api.access_token(credential).await?;
        let response = self.api.adapter_drivers(&token, self.window).await?;
        let account = if self.tag_accounts {
            Some(credential.label())
        } else {
            None
        };
        Ok(flatten_response(&response, account, self.cleaner.as_ref()))
    }

    /// Fetch every account; failures are counted, never returned
    pub async fn fetch_all(&self, credentials: &[Credential]) -> FetchOutcome {
        let progress = ProgressReporter::new(credentials.len(), "accounts", self.show_progress);
        info!(
            "Fetching {} accounts with {} workers",
            credentials.len(),
            self.workers
        );

        let (records, mut stats) = stream::iter(credentials)
            .map(|credential| {
                let progress = progress.clone();
                async move {
                    progress.set_message(format!("Fetching: {}", credential.label()));
                    let result = self.fetch_account(credential).await;
                    progress.increment();

                    match result {
                        Ok(rows) if rows.is_empty() => {
                            debug!("No roaming data for {}", credential.label());
                            AccountResult::Empty
                        }
                        Ok(rows) => {
                            debug!("{} rows for {}", rows.len(), credential.label());
                            AccountResult::Rows(rows)
                        }
                        Err(e) => {
                            warn!("Fetch failed for {}: {}", credential.label(), e);
                            AccountResult::Failed
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .fold(
                (Vec::new(), FetchStats::default()),
                |(mut records, mut stats), result| async move {
                    match result {
                        AccountResult::Rows(rows) => {
                            records.extend(rows);
                            stats.succeeded += 1;
                        }
                        AccountResult::Empty => stats.empty += 1,
                        AccountResult::Failed => stats.failed += 1,
                    }
                    (records, stats)
                },
            )
            .await;

        stats.configured = credentials.len();
        progress.finish(stats.describe());
        info!("Fetch finished: {}", stats.describe());
        FetchOutcome { records, stats }
    }
}

/// Result of the daily history fetch
#[derive(Debug, Clone)]
pub struct HistoryFetchReport {
    pub stats: FetchStats,
    pub rows_written: usize,
    /// `None` when no account returned data and nothing was written
    pub output: Option<PathBuf>,
}

/// Fleet-wide fetch written to the history file for `date`
pub async fn fetch_history<A: RoamingApi>(
    api: &A,
    credentials: &[Credential],
    config: &RoamingConfig,
    date: NaiveDate,
    show_progress: bool,
) -> Result<HistoryFetchReport> {
    let window = match (config.fetch.from_ms, config.fetch.to_ms) {
        (Some(from_ms), Some(to_ms)) => Some(TimeWindow { from_ms, to_ms }),
        _ => None,
    };

    let outcome = RoamingFetcher::new(api, config.fetch.workers)
        .with_window(window)
        .with_key_cleaner(KeyCleaner::new(&config.fetch.key_prefix_pattern)?)
        .with_progress(show_progress)
        .fetch_all(credentials)
        .await;

    if outcome.records.is_empty() {
        warn!("No valid data collected ({})", outcome.stats.describe());
        println!(
            "  {} No valid data collected, history file not written ({})",
            "⚠".yellow(),
            outcome.stats.describe()
        );
        return Ok(HistoryFetchReport {
            stats: outcome.stats,
            rows_written: 0,
            output: None,
        });
    }

    let spec = AggregationSpec::new(GroupKey::AdapterAndDriver, config.fetch.formula).descending();
    let grouped = aggregate_records(&outcome.records, &spec)?;
    let path = history_file_path(&config.paths.history_dir, date);
    let rows_written = write_history_file(&path, &grouped)?;

    println!(
        "  {} {} rows saved to {}",
        "✓".green(),
        rows_written.to_string().bright_white().bold(),
        path.display()
    );

    Ok(HistoryFetchReport {
        stats: outcome.stats,
        rows_written,
        output: Some(path),
    })
}
