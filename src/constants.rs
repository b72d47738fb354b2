//! Application constants for the roaming report pipeline
//!
//! Column headers, artifact file names, API endpoints and the default
//! thresholds used when no configuration file overrides them.

// =============================================================================
// Upstream API
// =============================================================================

/// Base URL of the monitoring API
pub const DEFAULT_API_BASE: &str = "https://api-v2.7signal.com";

/// OAuth2 client-credentials token endpoint (relative to the API base)
pub const TOKEN_PATH: &str = "/oauth2/token";

/// Adapter/driver KPI endpoint (relative to the API base)
pub const ADAPTER_DRIVERS_PATH: &str = "/kpis/agents/adapter-drivers";

/// KPI type requested from the adapter/driver endpoint
pub const ROAMING_KPI_TYPE: &str = "ROAMING";

/// Placeholder used when the API omits the adapter or driver string
pub const UNKNOWN_VALUE: &str = "Unknown";

// =============================================================================
// Vendor catalog scraping
// =============================================================================

/// Driver catalog search page (query appended as `q=`)
pub const CATALOG_SEARCH_URL: &str = "https://www.catalog.update.microsoft.com/Search.aspx";

/// Element id of the catalog results table
pub const CATALOG_RESULTS_TABLE_ID: &str = "ctl00_catalogBody_updateMatches";

/// Zero-based index of the "Last Updated" cell in a catalog result row
pub const CATALOG_LAST_UPDATED_CELL: usize = 4;

/// Sentinel stored when a driver vintage could not be determined
pub const VINTAGE_NOT_FOUND: &str = "Not Found";

/// Intel wireless driver download page
pub const INTEL_DRIVER_URL: &str = "https://www.intel.com/content/www/us/en/download/19351/intel-wireless-wi-fi-drivers-for-windows-10-and-windows-11.html";

/// Maximum length of the joined supported-adapter text in the CSV form
pub const INTEL_ADAPTERS_MAX_CHARS: usize = 325;

// =============================================================================
// Artifact file names
// =============================================================================

/// Prefix of dated fetch outputs in the history directory
pub const HISTORY_FILE_PREFIX: &str = "roaming_data";

pub const AGGREGATED_FILE: &str = "aggregated_roaming_data.csv";
pub const VINTAGE_FILE: &str = "driver_vintage.csv";
pub const MERGED_CSV_FILE: &str = "merged_roaming_analysis_with_vintage.csv";
pub const MERGED_JSON_FILE: &str = "merged_roaming_analysis_with_vintage.json";
pub const MANUFACTURERS_FILE: &str = "manufacturers.csv";
pub const TOTAL_SAMPLES_FILE: &str = "total_samples.csv";
pub const CRITICAL_MINUTES_FILE: &str = "aggregated_critical_roaming_minutes.json";
pub const INTEL_DRIVER_CSV_FILE: &str = "intel_driver_info.csv";
pub const INTEL_DRIVER_JSON_FILE: &str = "intel_driver_info.json";

pub const BAD_DRIVERS_DIR: &str = "bad_drivers_per_acct";
pub const BAD_DRIVERS_FILE_PREFIX: &str = "bad_drivers_for_";
pub const DRIVER_REPORTS_DIR: &str = "roaming_impact_reports_per_acct";
pub const DRIVER_REPORT_SUFFIX: &str = "_driver_summary.xlsx";

/// Date format embedded in history file names
pub const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Thresholds and defaults
// =============================================================================

/// Minimum summed minutes for an adapter-driver group to be reported
pub const DEFAULT_MIN_TOTAL_MINUTES: i64 = 10_000;

/// Per-account percentage below which a driver is reported as bad
pub const DEFAULT_BAD_THRESHOLD: f64 = 99.0;

/// Fleet-wide percentage above which a driver is listed as good
pub const DEFAULT_GOOD_THRESHOLD: f64 = 99.5;

/// Default denylist of junk adapter-driver / driver strings
pub const DEFAULT_DENYLIST: &[&str] = &["N/A", "nan", "iwlwifi", ""];

/// Junk prefix removed from adapter and adapter-driver strings
pub const DEFAULT_KEY_PREFIX_PATTERN: &str = r"^[^-]*-\s*";

pub const DEFAULT_HISTORY_WORKERS: usize = 10;
pub const DEFAULT_ACCOUNT_WORKERS: usize = 3;
pub const DEFAULT_VINTAGE_WORKERS: usize = 3;
pub const DEFAULT_HISTORY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ACCOUNT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REPORT_WINDOW_DAYS: i64 = 10;

// =============================================================================
// Column Name Constants
// =============================================================================

/// Column headers shared by every CSV artifact
pub mod columns {
    pub const ACCOUNT_NAME: &str = "Account Name";
    pub const ADAPTER: &str = "Adapter";
    pub const DRIVER: &str = "Driver";
    pub const ADAPTER_DRIVER: &str = "Adapter-Driver";
    pub const GOOD_SUM: &str = "Good Sum";
    pub const CRITICAL_SUM: &str = "Critical Sum";
    pub const WARNING_SUM: &str = "Warning Sum";
    pub const CLIENT_COUNT: &str = "Client Count";
    pub const TOTAL_SUM: &str = "Total Sum";
    pub const GOOD_PCT: &str = "Good Roaming Calculation (%)";
    pub const DRIVER_VINTAGE: &str = "Driver Vintage";
    pub const CRITICAL_MINUTES: &str = "Critical Minutes";
    pub const TOTAL_SAMPLES: &str = "Total Samples";

    /// Internal join column holding the normalized adapter-driver key
    pub const JOIN_KEY: &str = "__join_key";
}
