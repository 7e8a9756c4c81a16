//! Graph builder entry point: expand the test matrix into pending records.

use anyhow::{anyhow, Result};

use perfrig::cli::{self, ToolArgs};
use perfrig::infrastructure::{limits, logging};
use perfrig::services::GraphBuilder;

#[tokio::main]
async fn main() {
    let args: ToolArgs = cli::parse_or_usage();
    if let Err(err) = run(args).await {
        eprintln!("perfrig-build: {err:#}");
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
        memory_per_core_mb = limits.memory_per_core_mb,
        "resource limits loaded"
    );

    let adapter = perfrig::adapters::create(&config.adapter)
        .ok_or_else(|| anyhow!("unknown adapter: {}", config.adapter))?;

    let builder = GraphBuilder::new(config, limits, adapter);
    let summary = builder.build().await?;
    println!(
        "created {} record(s) ({} precondition), skipped {}",
        summary.created, summary.preconditions, summary.skipped
    );
    Ok(())
}
