use clap::Parser;
use roaming_report::RoamingError;
use roaming_report::cli::{args::Args, commands};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(args) => result.map(|_| ()),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    eprintln!("Failed to listen for CTRL+C: {}", e);
                }
                eprintln!("\nReceived CTRL+C, stopping...");
                Err(RoamingError::interrupted("stopped by user").into())
            }
        }
    });

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Roaming Report - Wi-Fi roaming quality reporting");
    println!("================================================");
    println!();
    println!("Fetches roaming telemetry per account, aggregates the daily history,");
    println!("dates every driver from the vendor catalog and writes per-account and");
    println!("fleet-wide reports.");
    println!();
    println!("USAGE:");
    println!("    roaming-report <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    fetch             Append today's fleet history file (daily schedule)");
    println!("    aggregate         Re-aggregate all history files");
    println!("    vintage           Look up driver release dates");
    println!("    merge             Join aggregates with driver vintage");
    println!("    bad-drivers       Per-account CSVs of drivers below the threshold");
    println!("    driver-reports    Per-account driver summary workbooks");
    println!("    fleet-summary     Manufacturer share and total samples");
    println!("    critical-minutes  Total critical roaming minutes");
    println!("    intel-driver      Latest Intel wireless driver release");
    println!("    run               Run a list of stages in order");
    println!();
    println!("EXAMPLES:");
    println!("    # Daily history collection:");
    println!("    roaming-report fetch --credentials accounts.xlsx");
    println!();
    println!("    # Full report run:");
    println!("    roaming-report run --output-dir reports/");
    println!();
    println!("    # Rebuild the reports from existing history only:");
    println!("    roaming-report run aggregate,vintage,merge,fleet-summary");
    println!();
    println!("For detailed help on any command, use:");
    println!("    roaming-report <COMMAND> --help");
}
