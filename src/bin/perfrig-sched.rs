//! Scheduler entry point: admit pending records until drained.

use anyhow::Result;

use perfrig::cli::{self, ToolArgs};
use perfrig::infrastructure::{limits, logging};
use perfrig::services::Scheduler;

#[tokio::main]
async fn main() {
    let args: ToolArgs = cli::parse_or_usage();
    if let Err(err) = run(args).await {
        eprintln!("perfrig-sched: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: ToolArgs) -> Result<()> {
    let config = cli::load_config(&args.file)?;
    let _guard = logging::init(&config.logging, args.verbose)?;

    let limits = limits::load(&config.resource, &cli::resources_dir(&config))?;
    tracing::info!(
        resource = %limits.name,
        core_limit = limits.core_limit,
        poll_secs = config.scheduler.poll_secs,
        "scheduler starting"
    );

    let mut scheduler = Scheduler::new(config, limits);
    scheduler.run().await?;
    Ok(())
}
