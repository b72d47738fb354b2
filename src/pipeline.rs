//! Stage sequencing.
//!
//! A `Pipeline` is a validated list of stages run in-process, in order. Each
//! stage still hands off through its artifact files, so any stage can also
//! run alone against artifacts left by an earlier run. A stage error stops
//! the run; a stage that finds no input reports it and the run continues.

use crate::aggregate::{aggregate_history, summarize_critical_minutes};
use crate::config::RoamingConfig;
use crate::constants::{
    CRITICAL_MINUTES_FILE, INTEL_DRIVER_CSV_FILE, INTEL_DRIVER_JSON_FILE, MANUFACTURERS_FILE,
    TOTAL_SAMPLES_FILE,
};
use crate::credentials::CredentialSource;
use crate::error::{Result, RoamingError};
use crate::fetcher::{RoamingApi, fetch_history};
use crate::merge::merge_files;
use crate::reports::{find_bad_drivers, fleet_summary, write_driver_reports};
use crate::vintage::intel::{fetch_intel_driver_info, write_intel_driver_info};
use crate::vintage::{VintageLookup, enrich_vintage};
use chrono::{DateTime, Local};
use colored::*;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Fetch,
    Aggregate,
    Vintage,
    Merge,
    BadDrivers,
    DriverReports,
    FleetSummary,
    CriticalMinutes,
    IntelDriver,
}

impl Stage {
    /// Every stage in canonical order
    pub const ALL: [Stage; 9] = [
        Stage::Fetch,
        Stage::Aggregate,
        Stage::Vintage,
        Stage::Merge,
        Stage::BadDrivers,
        Stage::DriverReports,
        Stage::FleetSummary,
        Stage::CriticalMinutes,
        Stage::IntelDriver,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Aggregate => "aggregate",
            Stage::Vintage => "vintage",
            Stage::Merge => "merge",
            Stage::BadDrivers => "bad-drivers",
            Stage::DriverReports => "driver-reports",
            Stage::FleetSummary => "fleet-summary",
            Stage::CriticalMinutes => "critical-minutes",
            Stage::IntelDriver => "intel-driver",
        }
    }

    /// Stages whose output this stage reads
    pub fn dependencies(&self) -> &'static [Stage] {
        match self {
            Stage::Aggregate => &[Stage::Fetch],
            Stage::Vintage => &[Stage::Aggregate],
            Stage::Merge => &[Stage::Aggregate, Stage::Vintage],
            Stage::DriverReports => &[Stage::BadDrivers, Stage::Merge],
            Stage::FleetSummary => &[Stage::Merge],
            Stage::CriticalMinutes => &[Stage::Fetch],
            Stage::Fetch | Stage::BadDrivers | Stage::IntelDriver => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = RoamingError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
                RoamingError::invalid_pipeline(format!(
                    "unknown stage '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Stages run by `run` when none are given
pub const DEFAULT_STAGES: [Stage; 8] = [
    Stage::Fetch,
    Stage::Aggregate,
    Stage::Vintage,
    Stage::Merge,
    Stage::BadDrivers,
    Stage::DriverReports,
    Stage::FleetSummary,
    Stage::CriticalMinutes,
];

/// A validated stage list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stages: DEFAULT_STAGES.to_vec(),
        }
    }
}

impl Pipeline {
    /// Reject empty lists, duplicates, and a stage listed before a listed
    /// stage it depends on
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(RoamingError::invalid_pipeline("no stages given"));
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(*stage) {
                return Err(RoamingError::invalid_pipeline(format!(
                    "stage '{}' listed more than once",
                    stage
                )));
            }
        }

        for (position, stage) in stages.iter().enumerate() {
            for dependency in stage.dependencies() {
                if let Some(dep_position) = stages.iter().position(|s| s == dependency) {
                    if dep_position > position {
                        return Err(RoamingError::invalid_pipeline(format!(
                            "'{}' must run after '{}'",
                            stage, dependency
                        )));
                    }
                }
            }
        }

        Ok(Self { stages })
    }

    /// Parse and validate a list of stage names
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let stages = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<Stage>>>()?;
        Self::new(stages)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order, stopping at the first error
    pub async fn run<A, L, C>(&self, ctx: &StageContext<'_, A, L, C>) -> Result<Vec<StageRun>>
    where
        A: RoamingApi,
        L: VintageLookup,
        C: CredentialSource,
    {
        let mut runs = Vec::with_capacity(self.stages.len());
        for (index, stage) in self.stages.iter().enumerate() {
            println!(
                "{} {}",
                format!("[{}/{}]", index + 1, self.stages.len()).bright_blue(),
                stage.name().bold()
            );
            let started = Instant::now();
            match run_stage(*stage, ctx).await {
                Ok(outcome) => {
                    if let StageOutcome::NoInput(reason) = &outcome {
                        warn!("Stage {} found no input: {}", stage, reason);
                    }
                    runs.push(StageRun {
                        stage: *stage,
                        outcome,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) => {
                    error!("Stage {} failed: {}", stage, e);
                    return Err(e);
                }
            }
        }
        Ok(runs)
    }
}

/// What a finished stage reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed(String),
    NoInput(String),
}

#[derive(Debug, Clone)]
pub struct StageRun {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// Everything a stage may need
///
/// The fleet fetch and the per-account report talk to the same API with
/// different timeouts, hence two clients.
pub struct StageContext<'a, A, L, C> {
    pub config: &'a RoamingConfig,
    pub history_api: &'a A,
    pub account_api: &'a A,
    pub lookup: &'a L,
    pub credentials: &'a C,
    pub now: DateTime<Local>,
    pub show_progress: bool,
}

/// Run one stage against its artifacts
pub async fn run_stage<A, L, C>(stage: Stage, ctx: &StageContext<'_, A, L, C>) -> Result<StageOutcome>
where
    A: RoamingApi,
    L: VintageLookup,
    C: CredentialSource,
{
    let config = ctx.config;
    let output_dir = &config.paths.output_dir;
    info!("Running stage {}", stage);

    let outcome = match stage {
        Stage::Fetch => {
            let credentials = ctx.credentials.load(false)?;
            let report = fetch_history(
                ctx.history_api,
                &credentials,
                config,
                ctx.now.date_naive(),
                ctx.show_progress,
            )
            .await?;
            match report.output {
                Some(path) => StageOutcome::Completed(format!(
                    "{} rows -> {} ({})",
                    report.rows_written,
                    path.display(),
                    report.stats.describe()
                )),
                None => StageOutcome::NoInput(report.stats.describe()),
            }
        }
        Stage::Aggregate => {
            match aggregate_history(
                &config.paths.history_dir,
                &config.aggregated_path(),
                &config.aggregate,
            )? {
                Some(summary) => StageOutcome::Completed(format!(
                    "{} groups from {} files",
                    summary.groups_out, summary.files_read
                )),
                None => StageOutcome::NoInput(format!(
                    "no history files in {}",
                    config.paths.history_dir.display()
                )),
            }
        }
        Stage::Vintage => {
            let report = enrich_vintage(
                ctx.lookup,
                &config.aggregated_path(),
                &config.vintage_path(),
                &config.vintage,
                ctx.show_progress,
            )
            .await?;
            StageOutcome::Completed(format!(
                "{}/{} drivers dated, {} looked up",
                report.found, report.keys, report.queried
            ))
        }
        Stage::Merge => {
            let report = merge_files(
                &config.aggregated_path(),
                &config.vintage_path(),
                &config.merged_csv_path(),
                &config.merged_json_path(),
            )?;
            StageOutcome::Completed(format!("{} rows, {} with vintage", report.rows, report.matched))
        }
        Stage::BadDrivers => {
            let credentials = ctx.credentials.load(true)?;
            let report =
                find_bad_drivers(ctx.account_api, &credentials, config, ctx.now, ctx.show_progress).await?;
            if report.fetch.succeeded == 0 {
                StageOutcome::NoInput(report.fetch.describe())
            } else {
                StageOutcome::Completed(format!(
                    "{} bad drivers in {} account files",
                    report.bad_rows,
                    report.files.len()
                ))
            }
        }
        Stage::DriverReports => {
            let report = write_driver_reports(
                &config.bad_drivers_dir(),
                &config.merged_csv_path(),
                &config.driver_reports_dir(),
                config.reports.good_threshold,
            )?;
            if report.accounts == 0 && report.skipped == 0 {
                StageOutcome::NoInput(format!(
                    "no bad-driver files in {}",
                    config.bad_drivers_dir().display()
                ))
            } else {
                StageOutcome::Completed(format!("{} workbooks", report.accounts))
            }
        }
        Stage::FleetSummary => {
            let summary = fleet_summary(
                &config.merged_csv_path(),
                &output_dir.join(MANUFACTURERS_FILE),
                &output_dir.join(TOTAL_SAMPLES_FILE),
            )?;
            StageOutcome::Completed(format!(
                "{} manufacturers, {} total samples",
                summary.manufacturers.len(),
                summary.total_samples
            ))
        }
        Stage::CriticalMinutes => {
            match summarize_critical_minutes(
                &config.paths.history_dir,
                &output_dir.join(CRITICAL_MINUTES_FILE),
            )? {
                Some(summary) => {
                    StageOutcome::Completed(format!("{} critical minutes", summary.total_minutes))
                }
                None => StageOutcome::NoInput(format!(
                    "no history files in {}",
                    config.paths.history_dir.display()
                )),
            }
        }
        Stage::IntelDriver => {
            let info = fetch_intel_driver_info(
                &config.vintage.intel_driver_url,
                Duration::from_secs(config.vintage.timeout_secs),
            )
            .await?;
            write_intel_driver_info(
                &info,
                &output_dir.join(INTEL_DRIVER_JSON_FILE),
                &output_dir.join(INTEL_DRIVER_CSV_FILE),
            )?;
            StageOutcome::Completed(format!("latest version {}", info.latest_driver_version))
        }
    };
    Ok(outcome)
}
