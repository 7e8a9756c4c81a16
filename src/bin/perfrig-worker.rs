//! Worker entry point: execute one job record to completion.
//!
//! Spawned by the scheduler with the record path as sole positional
//! argument. The exit status is deliberately not part of the contract;
//! the outcome lives in the record itself. A fatal abort (for instance a
//! missing input directory) exits non-zero and leaves the record in the
//! in-progress area for inspection.

use anyhow::Result;

use perfrig::cli::{self, WorkerArgs};
use perfrig::domain::models::LoggingConfig;
use perfrig::infrastructure::logging;
use perfrig::services::ExecutionWrapper;

#[tokio::main]
async fn main() {
    let args: WorkerArgs = cli::parse_or_usage();
    if let Err(err) = run(args).await {
        eprintln!("perfrig-worker: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: WorkerArgs) -> Result<()> {
    let _guard = logging::init(&LoggingConfig::default(), args.verbose)?;

    let mut wrapper = ExecutionWrapper::bind(&args.record).await?;
    wrapper.run().await?;
    Ok(())
}
