//! Core data structures for roaming telemetry processing.
//!
//! Defines credentials, flattened API rows, aggregated and merged records,
//! driver vintage rows and reporting time windows.

use crate::constants::columns;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A client secret that never prints its content
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext for the single call that needs it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// API credentials for one customer account
#[derive(Debug, Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: Secret,
    pub account_name: Option<String>,
}

impl Credential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            account_name: None,
        }
    }

    pub fn with_account(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Display label used in logs
    pub fn label(&self) -> &str {
        self.account_name.as_deref().unwrap_or(&self.client_id)
    }
}

/// How the good-roaming percentage is derived from minute sums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoodRoamingFormula {
    /// good / total × 100
    GoodOverTotal,
    /// (1 − critical / total) × 100, warning minutes count as good
    NonCritical,
}

impl GoodRoamingFormula {
    /// Percentage for the given sums; 100 when there are no minutes at all
    pub fn percentage(&self, good: i64, critical: i64, total: i64) -> f64 {
        if total <= 0 {
            return 100.0;
        }
        match self {
            GoodRoamingFormula::GoodOverTotal => good as f64 / total as f64 * 100.0,
            GoodRoamingFormula::NonCritical => (1.0 - critical as f64 / total as f64) * 100.0,
        }
    }
}

/// One flattened row of the adapter/driver API response
#[derive(Debug, Clone, PartialEq)]
pub struct RoamingRecord {
    pub account_name: Option<String>,
    pub adapter: String,
    pub driver: String,
    pub adapter_driver: String,
    pub good_sum: i64,
    pub critical_sum: i64,
    pub warning_sum: i64,
    pub client_count: i64,
}

impl RoamingRecord {
    pub fn total(&self) -> i64 {
        self.good_sum + self.critical_sum + self.warning_sum
    }
}

/// One row after grouping and summation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub account_name: Option<String>,
    pub adapter: String,
    pub driver: Option<String>,
    pub adapter_driver: String,
    pub good_sum: i64,
    pub critical_sum: i64,
    pub warning_sum: i64,
    pub client_count: i64,
    pub total_sum: i64,
    pub good_pct: f64,
}

/// Row layout of a dated history file
///
/// Older history files only carry the adapter-driver key, so adapter and
/// driver are optional when reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "Adapter", default)]
    pub adapter: Option<String>,
    #[serde(rename = "Driver", default)]
    pub driver: Option<String>,
    #[serde(rename = "Adapter-Driver")]
    pub adapter_driver: String,
    #[serde(rename = "Good Sum")]
    pub good_sum: i64,
    #[serde(rename = "Critical Sum")]
    pub critical_sum: i64,
    #[serde(rename = "Warning Sum")]
    pub warning_sum: i64,
    #[serde(rename = "Client Count")]
    pub client_count: i64,
    #[serde(rename = "Total Sum", default)]
    pub total_sum: Option<i64>,
    #[serde(rename = "Good Roaming Calculation (%)", default)]
    pub good_pct: Option<String>,
}

impl HistoryRow {
    pub fn from_aggregated(record: &AggregatedRecord) -> Self {
        Self {
            adapter: Some(record.adapter.clone()),
            driver: record.driver.clone(),
            adapter_driver: record.adapter_driver.clone(),
            good_sum: record.good_sum,
            critical_sum: record.critical_sum,
            warning_sum: record.warning_sum,
            client_count: record.client_count,
            total_sum: Some(record.total_sum),
            good_pct: Some(format!("{:.1}%", record.good_pct)),
        }
    }

    /// Convert back into a flattened record for re-aggregation
    pub fn into_record(self) -> RoamingRecord {
        let adapter = self
            .adapter
            .unwrap_or_else(|| adapter_from_key(&self.adapter_driver).to_string());
        RoamingRecord {
            account_name: None,
            driver: self.driver.unwrap_or_default(),
            adapter,
            adapter_driver: self.adapter_driver,
            good_sum: self.good_sum,
            critical_sum: self.critical_sum,
            warning_sum: self.warning_sum,
            client_count: self.client_count,
        }
    }
}

/// Row layout of the fleet-wide aggregated table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    #[serde(rename = "Adapter-Driver")]
    pub adapter_driver: String,
    #[serde(rename = "Adapter")]
    pub adapter: String,
    #[serde(rename = "Good Sum")]
    pub good_sum: i64,
    #[serde(rename = "Critical Sum")]
    pub critical_sum: i64,
    #[serde(rename = "Warning Sum")]
    pub warning_sum: i64,
    #[serde(rename = "Client Count")]
    pub client_count: i64,
    #[serde(rename = "Total Sum")]
    pub total_sum: i64,
    #[serde(rename = "Good Roaming Calculation (%)")]
    pub good_pct: f64,
}

impl From<&AggregatedRecord> for AggregatedRow {
    fn from(record: &AggregatedRecord) -> Self {
        Self {
            adapter_driver: record.adapter_driver.clone(),
            adapter: record.adapter.clone(),
            good_sum: record.good_sum,
            critical_sum: record.critical_sum,
            warning_sum: record.warning_sum,
            client_count: record.client_count,
            total_sum: record.total_sum,
            good_pct: round1(record.good_pct),
        }
    }
}

/// Driver vintage for one adapter-driver key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VintageRecord {
    #[serde(rename = "Adapter-Driver")]
    pub adapter_driver: String,
    #[serde(rename = "Driver Vintage")]
    pub vintage: String,
}

impl VintageRecord {
    pub fn is_found(&self) -> bool {
        self.vintage != crate::constants::VINTAGE_NOT_FOUND
    }
}

/// Aggregated row with its driver vintage attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(rename = "Adapter-Driver")]
    pub adapter_driver: String,
    #[serde(rename = "Adapter")]
    pub adapter: String,
    #[serde(rename = "Good Sum")]
    pub good_sum: i64,
    #[serde(rename = "Critical Sum")]
    pub critical_sum: i64,
    #[serde(rename = "Warning Sum")]
    pub warning_sum: i64,
    #[serde(rename = "Client Count")]
    pub client_count: i64,
    #[serde(rename = "Total Sum")]
    pub total_sum: i64,
    #[serde(rename = "Good Roaming Calculation (%)")]
    pub good_pct: f64,
    #[serde(rename = "Driver Vintage")]
    pub driver_vintage: Option<String>,
}

/// Row layout of a per-account bad-driver file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadDriverRow {
    #[serde(rename = "Account Name")]
    pub account_name: String,
    #[serde(rename = "Adapter")]
    pub adapter: String,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Adapter-Driver")]
    pub adapter_driver: String,
    #[serde(rename = "Critical Minutes")]
    pub critical_minutes: i64,
    #[serde(rename = "Client Count")]
    pub client_count: i64,
    #[serde(rename = "Total Minutes")]
    pub total_minutes: i64,
    #[serde(rename = "Good Roaming Calculation (%)")]
    pub good_pct: f64,
}

/// Millisecond-epoch reporting window passed as `from`/`to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeWindow {
    /// Window covering the `days` days up to `now`
    pub fn last_days(days: i64, now: DateTime<Local>) -> Self {
        let from = now - Duration::days(days);
        Self {
            from_ms: from.timestamp_millis(),
            to_ms: now.timestamp_millis(),
        }
    }
}

/// Normalized join identity: trimmed and lowercased
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Best-effort adapter portion of an "adapter - driver" key
pub fn adapter_from_key(key: &str) -> &str {
    match key.rfind(" - ") {
        Some(idx) => key[..idx].trim(),
        None => key.trim(),
    }
}

/// Round to one decimal place, as the reports display percentages
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Column header list of the aggregated table, in output order
pub fn aggregated_headers() -> [&'static str; 8] {
    [
        columns::ADAPTER_DRIVER,
        columns::ADAPTER,
        columns::GOOD_SUM,
        columns::CRITICAL_SUM,
        columns::WARNING_SUM,
        columns::CLIENT_COUNT,
        columns::TOTAL_SUM,
        columns::GOOD_PCT,
    ]
}

/// Column header list of the merged table, in output order
pub fn merged_headers() -> [&'static str; 9] {
    [
        columns::ADAPTER_DRIVER,
        columns::ADAPTER,
        columns::GOOD_SUM,
        columns::CRITICAL_SUM,
        columns::WARNING_SUM,
        columns::CLIENT_COUNT,
        columns::TOTAL_SUM,
        columns::GOOD_PCT,
        columns::DRIVER_VINTAGE,
    ]
}
