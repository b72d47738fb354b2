//! Command execution for the roaming report CLI
//!
//! Sets up logging, layers the configuration (file, environment, flags),
//! builds the HTTP clients and runs the selected pipeline.

use crate::cli::args::{Args, Commands};
use crate::config::RoamingConfig;
use crate::credentials::TabularCredentials;
use crate::fetcher::HttpRoamingApi;
use crate::pipeline::{StageContext, StageOutcome, StageRun};
use crate::vintage::CatalogBackend;
use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use indicatif::HumanDuration;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Run the command selected on the command line
pub async fn run(args: Args) -> Result<Vec<StageRun>> {
    let started = Instant::now();
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);

    let command = args
        .command
        .clone()
        .context("no command given")?;
    let pipeline = command.pipeline().context("invalid stage list")?;
    let config = load_configuration(&args)?;

    let history_api = HttpRoamingApi::new(
        &config.api,
        Duration::from_secs(config.fetch.timeout_secs),
    )
    .context("failed to build the history API client")?;
    let account_api = HttpRoamingApi::new(
        &config.api,
        Duration::from_secs(config.reports.timeout_secs),
    )
    .context("failed to build the account API client")?;
    let lookup = CatalogBackend::from_config(&config.vintage)
        .context("failed to set up the driver catalog lookup")?;
    let credentials = TabularCredentials::new(&config.paths.credentials);

    std::fs::create_dir_all(&config.paths.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.paths.output_dir.display()
        )
    })?;

    let ctx = StageContext {
        config: &config,
        history_api: &history_api,
        account_api: &account_api,
        lookup: &lookup,
        credentials: &credentials,
        now: Local::now(),
        show_progress: args.show_progress(),
    };

    info!(
        "Running {} stage(s): {}",
        pipeline.stages().len(),
        pipeline
            .stages()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let runs = pipeline.run(&ctx).await?;

    if !args.quiet {
        print_summary(&command, &runs, started.elapsed());
    }
    Ok(runs)
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roaming_report={}", log_level)));

    // try_init: tests may drive `run` more than once in a process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Load configuration using layered approach (file -> env -> args)
fn load_configuration(args: &Args) -> Result<RoamingConfig> {
    let mut config = RoamingConfig::discover(args.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(credentials) = &args.credentials {
        config.paths.credentials = credentials.clone();
    }
    if let Some(history_dir) = &args.history_dir {
        config.paths.history_dir = history_dir.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.paths.output_dir = output_dir.clone();
    }
    if let Some(api_base) = &args.api_base {
        config = config.with_api_base(api_base.clone());
    }
    if let Some(workers) = args.workers {
        config = config.with_fetch_workers(workers);
    }
    if let Some(min_total) = args.min_total {
        config = config.with_min_total_minutes(min_total);
    }

    config
        .validate()
        .context("invalid configuration after command-line overrides")?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn print_summary(command: &Commands, runs: &[StageRun], elapsed: Duration) {
    let title = match command {
        Commands::Run(_) => "Pipeline complete".to_string(),
        _ => format!(
            "{} complete",
            runs.first().map(|r| r.stage.name()).unwrap_or("stage")
        ),
    };
    println!();
    println!("{}", title.green().bold());
    for run in runs {
        let (marker, detail) = match &run.outcome {
            StageOutcome::Completed(detail) => ("ok".green(), detail),
            StageOutcome::NoInput(detail) => ("no input".yellow(), detail),
        };
        println!(
            "  {:<17} {:<9} {} ({})",
            run.stage.name().bold(),
            marker,
            detail,
            HumanDuration(run.elapsed)
        );
    }
    println!("  Total time: {}", HumanDuration(elapsed));
}
