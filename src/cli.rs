//! Command-line surface shared by the perfrig tools.
//!
//! Every tool takes `-f <config_file>` (required) and a repeatable `-v`.
//! Usage output exits with code 2, and a missing config file is fatal
//! with a non-zero exit, matching the rig's operational contract.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Arguments for the builder and scheduler tools.
#[derive(Parser, Debug)]
#[command(disable_version_flag = true)]
pub struct ToolArgs {
    /// Test configuration file
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Raise verbosity; repeat for more detail
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Arguments for the worker tool.
#[derive(Parser, Debug)]
#[command(disable_version_flag = true)]
pub struct WorkerArgs {
    /// Job record file to execute
    #[arg(value_name = "RECORD")]
    pub record: PathBuf,

    /// Raise verbosity; repeat for more detail
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse arguments, printing usage and exiting 2 on help or misuse.
pub fn parse_or_usage<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            let _ = e.print();
            std::process::exit(2);
        }
        // clap exits with code 2 on usage errors.
        Err(e) => e.exit(),
    }
}

/// Load and validate the configuration file named on the command line.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!("configuration file {} does not exist", path.display());
    }
    ConfigLoader::load_from_file(path)
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// Resource descriptor directory for a loaded configuration.
pub fn resources_dir(config: &Config) -> PathBuf {
    config.resources_dir.as_ref().map_or_else(
        || Path::new(&config.home).join("resources"),
        PathBuf::from,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_args_parse() {
        let args = ToolArgs::try_parse_from(["perfrig-build", "-f", "rig.yaml", "-vv"]).unwrap();
        assert_eq!(args.file, PathBuf::from("rig.yaml"));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_tool_args_require_file() {
        assert!(ToolArgs::try_parse_from(["perfrig-build"]).is_err());
    }

    #[test]
    fn test_worker_args_parse() {
        let args =
            WorkerArgs::try_parse_from(["perfrig-worker", "/rig/jobs/inprogress/a.job"]).unwrap();
        assert_eq!(args.record, PathBuf::from("/rig/jobs/inprogress/a.job"));
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_resources_dir_defaults_under_home() {
        let config = Config {
            home: "/rig".to_string(),
            ..Default::default()
        };
        assert_eq!(resources_dir(&config), PathBuf::from("/rig/resources"));

        let config = Config {
            resources_dir: Some("/etc/rig/resources".to_string()),
            ..config
        };
        assert_eq!(resources_dir(&config), PathBuf::from("/etc/rig/resources"));
    }

    #[test]
    fn test_missing_config_is_fatal() {
        assert!(load_config(Path::new("/no/such/rig.yaml")).is_err());
    }
}
