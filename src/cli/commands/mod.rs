//! Command implementations for the report ingestor CLI
//!
//! Each command lives in its own module:
//! - `ingest`: fetch reports and stream records into a JSON lines store
//! - `download`: save raw and decompressed reports, optionally ingesting them afterwards

pub mod download;
pub mod ingest;
pub mod shared;

pub use shared::RunSummary;

use crate::cli::args::{Args, Commands};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Dispatch to the requested subcommand
pub async fn run(args: Args, cancellation_token: CancellationToken) -> Result<RunSummary> {
    match args.command {
        Some(Commands::Ingest(ingest_args)) => {
            ingest::run_ingest(ingest_args, cancellation_token).await
        }
        Some(Commands::Download(download_args)) => {
            download::run_download(download_args, cancellation_token).await
        }
        None => Err(Error::configuration("No command given")),
    }
}
