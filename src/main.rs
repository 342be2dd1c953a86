use clap::Parser;
use report_ingestor::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

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
        let cancellation_token = CancellationToken::new();

        // Cancel in-flight backoffs and queued accounts on Ctrl+C, then let the
        // run drain so every account still reports an outcome
        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                    signal_token.cancel();
                }
                Err(e) => eprintln!("Failed to install CTRL+C signal handler: {}", e),
            }
        });

        let result = commands::run(args, cancellation_token.clone()).await;
        if cancellation_token.is_cancelled() && result.is_ok() {
            return Err(report_ingestor::Error::processing_interrupted(
                "Run interrupted by user; results above are partial",
            ));
        }
        result
    });

    match result {
        // Partial failures are listed in the summary and still exit 0
        Ok(_summary) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", anyhow::Error::new(error));
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Report Ingestor - concurrent report acquisition and ingestion");
    println!("=============================================================");
    println!();
    println!("Fetch one gzip CSV report per account on a bounded worker pool,");
    println!("map every row onto a typed record and store records in batches.");
    println!();
    println!("USAGE:");
    println!("    report-ingestor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    ingest      Stream reports into a JSON lines entity store (main command)");
    println!("    download    Save raw and decompressed reports to disk");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Ingest last month's account performance for every account under ./reports:");
    println!("    report-ingestor ingest --source ./reports --output ./store");
    println!();
    println!("    # Ingest a custom period for selected accounts:");
    println!("    report-ingestor ingest --source ./reports --accounts 123-456-7890,42 \\");
    println!("                           --date-range CUSTOM_DATE --start 20240101 --end 20240131");
    println!();
    println!("    # Download campaign reports, then ingest the saved files:");
    println!("    report-ingestor download --source ./reports --report-type CAMPAIGN_PERFORMANCE_REPORT \\");
    println!("                             --output ./downloads --ingest-into ./store");
    println!();
    println!("For detailed help on any command, use:");
    println!("    report-ingestor <COMMAND> --help");
}
