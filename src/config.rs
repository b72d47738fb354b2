//! Configuration management and validation.
//!
//! One `RoamingConfig` replaces the ad hoc constants scattered across the
//! individual stages: artifact paths, API endpoints, worker counts,
//! denylist values, thresholds and percentage formulas. Values come from
//! defaults, then an optional TOML file, then environment variables, then
//! CLI flags.

use crate::constants::*;
use crate::error::{Result, RoamingError};
use crate::models::GoodRoamingFormula;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Global configuration for the roaming pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoamingConfig {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    pub aggregate: AggregateConfig,
    pub vintage: VintageConfig,
    pub reports: ReportsConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Spreadsheet (xlsx/xls/ods) or CSV with client_id, client_secret, account_name
    pub credentials: PathBuf,

    /// Directory receiving dated fetch outputs
    pub history_dir: PathBuf,

    /// Directory receiving every other artifact
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            credentials: PathBuf::from("Customer_Data.xlsx"),
            history_dir: PathBuf::from("History"),
            output_dir: PathBuf::from("Output"),
        }
    }
}

/// Upstream monitoring API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), TOKEN_PATH)
    }

    pub fn adapter_drivers_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            ADAPTER_DRIVERS_PATH
        )
    }
}

/// Worker pool and formula settings for the fleet-wide daily fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub workers: usize,
    pub timeout_secs: u64,
    /// Regex removed from the start of adapter and adapter-driver strings
    pub key_prefix_pattern: String,
    pub formula: GoodRoamingFormula,
    /// Optional explicit window; both bounds in epoch milliseconds
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_HISTORY_WORKERS,
            timeout_secs: DEFAULT_HISTORY_TIMEOUT_SECS,
            key_prefix_pattern: DEFAULT_KEY_PREFIX_PATTERN.to_string(),
            formula: GoodRoamingFormula::NonCritical,
            from_ms: None,
            to_ms: None,
        }
    }
}

/// Denylist and thresholds for cross-day aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub denylist: Vec<String>,
    pub drop_leading_digit: bool,
    pub min_total_minutes: i64,
    pub drop_zero_percentage: bool,
    pub formula: GoodRoamingFormula,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            drop_leading_digit: true,
            min_total_minutes: DEFAULT_MIN_TOTAL_MINUTES,
            drop_zero_percentage: true,
            formula: GoodRoamingFormula::GoodOverTotal,
        }
    }
}

impl AggregateConfig {
    /// Whether a key or driver string is junk and must be dropped
    pub fn is_denied(&self, value: &str) -> bool {
        let trimmed = value.trim();
        if self.denylist.iter().any(|d| d == trimmed) {
            return true;
        }
        self.drop_leading_digit && trimmed.starts_with(|c: char| c.is_ascii_digit())
    }

    /// Whether a driver string is a known junk value; versions start with
    /// digits, so only the list applies here
    pub fn is_denied_driver(&self, driver: &str) -> bool {
        let trimmed = driver.trim();
        !trimmed.is_empty() && self.denylist.iter().any(|d| d == trimmed)
    }
}

/// Which lookup implementation resolves driver vintages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupBackend {
    /// Direct HTTP request of the catalog search page
    Http,
    /// Browser automation through a WebDriver endpoint
    WebDriver,
}

/// Driver vintage enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VintageConfig {
    pub backend: LookupBackend,
    pub search_url: String,
    pub workers: usize,
    pub timeout_secs: u64,
    /// Fixed pause before each lookup, 0 disables
    pub delay_ms: u64,
    /// Random extra pause added on top of `delay_ms`
    pub jitter_ms: u64,
    /// Re-query only keys missing from, or "Not Found" in, the previous table
    pub reuse_previous: bool,
    pub webdriver_url: String,
    pub intel_driver_url: String,
}

impl Default for VintageConfig {
    fn default() -> Self {
        Self {
            backend: LookupBackend::Http,
            search_url: CATALOG_SEARCH_URL.to_string(),
            workers: DEFAULT_VINTAGE_WORKERS,
            timeout_secs: 15,
            delay_ms: 0,
            jitter_ms: 0,
            reuse_previous: true,
            webdriver_url: "http://localhost:9515".to_string(),
            intel_driver_url: INTEL_DRIVER_URL.to_string(),
        }
    }
}

/// Per-account report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub workers: usize,
    pub timeout_secs: u64,
    pub window_days: i64,
    pub bad_threshold: f64,
    pub good_threshold: f64,
    pub formula: GoodRoamingFormula,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_ACCOUNT_WORKERS,
            timeout_secs: DEFAULT_ACCOUNT_TIMEOUT_SECS,
            window_days: DEFAULT_REPORT_WINDOW_DAYS,
            bad_threshold: DEFAULT_BAD_THRESHOLD,
            good_threshold: DEFAULT_GOOD_THRESHOLD,
            formula: GoodRoamingFormula::NonCritical,
        }
    }
}

impl RoamingConfig {
    /// Default config file location (`<config dir>/roaming-report/config.toml`)
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("roaming-report").join("config.toml"))
    }

    /// Load configuration from a specific TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RoamingConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, the default location, or defaults, then
    /// apply environment overrides
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(RoamingError::configuration(format!(
                        "Config file does not exist: {}",
                        path.display()
                    )));
                }
                info!("Using config file: {}", path.display());
                Self::load(path)?
            }
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!("Using config file: {}", path.display());
                    Self::load(&path)?
                }
                None => {
                    info!("No config file found, using defaults and environment variables");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROAMING_CREDENTIALS") {
            self.paths.credentials = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ROAMING_HISTORY_DIR") {
            self.paths.history_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ROAMING_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ROAMING_API_BASE") {
            self.api.base_url = val;
        }
    }

    /// Reject settings that would make a stage misbehave
    pub fn validate(&self) -> Result<()> {
        for (name, workers) in [
            ("fetch.workers", self.fetch.workers),
            ("vintage.workers", self.vintage.workers),
            ("reports.workers", self.reports.workers),
        ] {
            if workers == 0 {
                return Err(RoamingError::configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        for (name, threshold) in [
            ("reports.bad_threshold", self.reports.bad_threshold),
            ("reports.good_threshold", self.reports.good_threshold),
        ] {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(RoamingError::configuration(format!(
                    "{} must be within 0..=100, got {}",
                    name, threshold
                )));
            }
        }

        if self.aggregate.min_total_minutes < 0 {
            return Err(RoamingError::configuration(
                "aggregate.min_total_minutes must be non-negative",
            ));
        }

        if self.reports.window_days <= 0 {
            return Err(RoamingError::configuration(
                "reports.window_days must be greater than 0",
            ));
        }

        if let (Some(from), Some(to)) = (self.fetch.from_ms, self.fetch.to_ms) {
            if from >= to {
                return Err(RoamingError::configuration(format!(
                    "fetch window is empty: from {} >= to {}",
                    from, to
                )));
            }
        }

        regex::Regex::new(&self.fetch.key_prefix_pattern).map_err(|e| {
            RoamingError::configuration(format!("fetch.key_prefix_pattern is invalid: {}", e))
        })?;

        Ok(())
    }

    /// Override the artifact directories
    pub fn with_paths(
        mut self,
        credentials: impl Into<PathBuf>,
        history_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        self.paths.credentials = credentials.into();
        self.paths.history_dir = history_dir.into();
        self.paths.output_dir = output_dir.into();
        self
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Override the fleet fetch worker count
    pub fn with_fetch_workers(mut self, workers: usize) -> Self {
        self.fetch.workers = workers;
        self
    }

    /// Override the minimum total minutes kept by the aggregator
    pub fn with_min_total_minutes(mut self, min_total: i64) -> Self {
        self.aggregate.min_total_minutes = min_total;
        self
    }

    pub fn aggregated_path(&self) -> PathBuf {
        self.paths.output_dir.join(AGGREGATED_FILE)
    }

    pub fn vintage_path(&self) -> PathBuf {
        self.paths.output_dir.join(VINTAGE_FILE)
    }

    pub fn merged_csv_path(&self) -> PathBuf {
        self.paths.output_dir.join(MERGED_CSV_FILE)
    }

    pub fn merged_json_path(&self) -> PathBuf {
        self.paths.output_dir.join(MERGED_JSON_FILE)
    }

    pub fn bad_drivers_dir(&self) -> PathBuf {
        self.paths.output_dir.join(BAD_DRIVERS_DIR)
    }

    pub fn driver_reports_dir(&self) -> PathBuf {
        self.paths.output_dir.join(DRIVER_REPORTS_DIR)
    }
}
