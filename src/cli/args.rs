//! Command-line argument definitions for the roaming report pipeline
//!
//! Every pipeline stage is its own subcommand; `run` executes a validated
//! list of stages in order. Path and worker overrides are global so they can
//! follow any subcommand.

use crate::pipeline::{DEFAULT_STAGES, Pipeline, Stage};
use crate::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the roaming report pipeline
///
/// Pulls Wi-Fi roaming quality telemetry per account, aggregates the daily
/// history, dates each driver against the vendor catalog and writes
/// per-account and fleet-wide reports.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "roaming-report",
    version,
    about = "Batch reporting pipeline for Wi-Fi roaming quality telemetry",
    long_about = "Fetches per-account roaming telemetry from the management API, keeps a dated \
                  daily history, aggregates it fleet-wide, enriches every adapter/driver pair \
                  with its release date from the vendor catalog and writes bad-driver CSVs, \
                  formatted per-account workbooks and fleet summaries."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file
    ///
    /// TOML file with `paths`, `api`, `fetch`, `aggregate`, `vintage` and
    /// `reports` sections. Defaults to <config dir>/roaming-report/config.toml
    /// when present.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "Configuration file (TOML)"
    )]
    pub config: Option<PathBuf>,

    /// Credential spreadsheet or CSV (client_id, client_secret, account_name)
    #[arg(
        long = "credentials",
        value_name = "FILE",
        global = true,
        help = "Credential spreadsheet or CSV export"
    )]
    pub credentials: Option<PathBuf>,

    /// Directory holding the dated `roaming_data_<date>.csv` files
    #[arg(
        long = "history-dir",
        value_name = "PATH",
        global = true,
        help = "Directory of dated history files"
    )]
    pub history_dir: Option<PathBuf>,

    /// Directory for aggregated, merged and report artifacts
    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "PATH",
        global = true,
        help = "Directory for generated artifacts"
    )]
    pub output_dir: Option<PathBuf>,

    /// Base URL of the roaming telemetry API
    #[arg(
        long = "api-base",
        value_name = "URL",
        global = true,
        help = "Base URL of the telemetry API"
    )]
    pub api_base: Option<String>,

    /// Concurrent account requests for the fleet fetch
    #[arg(
        short = 'w',
        long = "workers",
        value_name = "NUM",
        global = true,
        help = "Concurrent account requests for the history fetch"
    )]
    pub workers: Option<usize>,

    /// Groups with fewer total minutes than this are dropped by `aggregate`
    #[arg(
        long = "min-total",
        value_name = "MINUTES",
        global = true,
        help = "Minimum total minutes kept by the aggregator"
    )]
    pub min_total: Option<i64>,

    /// Disable progress bars
    #[arg(long = "no-progress", global = true, help = "Disable progress bars")]
    pub no_progress: bool,

    /// Enable verbose logging output
    ///
    /// Can be used multiple times for increased verbosity:
    /// -v: info level, -vv: debug level, -vvv: trace level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Available subcommands, one per stage plus `run`
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Fetch every account and append today's fleet history file
    Fetch,
    /// Re-aggregate all history files into the fleet table
    Aggregate,
    /// Look up the release date of every aggregated driver
    Vintage,
    /// Join the aggregated table with driver vintage
    Merge,
    /// Write per-account CSVs of drivers below the bad threshold
    BadDrivers,
    /// Write a formatted driver summary workbook per account
    DriverReports,
    /// Write manufacturer share and total sample count
    FleetSummary,
    /// Sum critical roaming minutes over the whole history
    CriticalMinutes,
    /// Scrape the latest Intel wireless driver release
    IntelDriver,
    /// Run a list of stages in order
    Run(RunArgs),
}

/// Arguments for the `run` command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    /// Stages to run, in order (comma-separated or repeated)
    ///
    /// Defaults to fetch, aggregate, vintage, merge, bad-drivers,
    /// driver-reports, fleet-summary, critical-minutes.
    #[arg(
        value_name = "STAGE",
        value_delimiter = ',',
        help = "Stages to run in order (default: all but intel-driver)"
    )]
    pub stages: Vec<String>,
}

impl Commands {
    /// The pipeline this command executes
    pub fn pipeline(&self) -> Result<Pipeline> {
        let single = |stage: Stage| Pipeline::new(vec![stage]);
        match self {
            Commands::Fetch => single(Stage::Fetch),
            Commands::Aggregate => single(Stage::Aggregate),
            Commands::Vintage => single(Stage::Vintage),
            Commands::Merge => single(Stage::Merge),
            Commands::BadDrivers => single(Stage::BadDrivers),
            Commands::DriverReports => single(Stage::DriverReports),
            Commands::FleetSummary => single(Stage::FleetSummary),
            Commands::CriticalMinutes => single(Stage::CriticalMinutes),
            Commands::IntelDriver => single(Stage::IntelDriver),
            Commands::Run(run) if run.stages.is_empty() => Pipeline::new(DEFAULT_STAGES.to_vec()),
            Commands::Run(run) => Pipeline::parse(&run.stages),
        }
    }
}

impl Args {
    /// Get the log level based on verbosity settings
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are shown unless quiet or disabled
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}
