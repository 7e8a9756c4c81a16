//! Logging initialization using tracing.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Initialize the global subscriber.
///
/// The configured level is the baseline; each `-v` on the command line
/// raises it one step (info -> debug -> trace). `RUST_LOG` overrides
/// everything when set. Returns a guard that must be held for the life of
/// the process when file output is enabled.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<Option<WorkerGuard>> {
    let level = escalate(&config.level, verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = if let Some(ref log_dir) = config.log_dir {
        let file_appender = rolling::daily(log_dir, "perfrig.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_target(true);

        if config.format == "json" {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        Some(guard)
    } else {
        if config.format == "json" {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    };

    Ok(guard)
}

/// Raise a baseline level by `verbosity` steps.
fn escalate(level: &str, verbosity: u8) -> String {
    const ORDER: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    let base = ORDER.iter().position(|l| *l == level).unwrap_or(2);
    let raised = (base + usize::from(verbosity)).min(ORDER.len() - 1);
    ORDER[raised].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalate() {
        assert_eq!(escalate("info", 0), "info");
        assert_eq!(escalate("info", 1), "debug");
        assert_eq!(escalate("info", 2), "trace");
        assert_eq!(escalate("info", 9), "trace");
        assert_eq!(escalate("warn", 1), "info");
        assert_eq!(escalate("bogus", 0), "info");
    }
}
