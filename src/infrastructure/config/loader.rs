use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("home must be set (the coordination root)")]
    EmptyHome,

    #[error("Invalid maximum_attempts: {0}. Must be at least 1")]
    InvalidMaximumAttempts(u32),

    #[error("Invalid number_repeats: {0}. Must be at least 1")]
    InvalidNumberRepeats(u32),

    #[error("Invalid cores_per_node: {0}. Must be at least 1")]
    InvalidCoresPerNode(u32),

    #[error("Invalid poll_secs: {0}. Must be at least 1")]
    InvalidPollPeriod(u64),

    #[error("Invalid lock timeout_secs: {0}. Must be at least 1")]
    InvalidLockTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: pretty, json")]
    InvalidLogFormat(String),

    #[error("core_counts contains 0, which can never be admitted")]
    ZeroCoreCount,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a specific file.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. The YAML file passed on the command line (`-f`)
    /// 3. Environment variables (`PERFRIG_` prefix, highest priority)
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("PERFRIG_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.home.trim().is_empty() {
            return Err(ConfigError::EmptyHome);
        }

        if config.maximum_attempts == 0 {
            return Err(ConfigError::InvalidMaximumAttempts(config.maximum_attempts));
        }

        if config.number_repeats == 0 {
            return Err(ConfigError::InvalidNumberRepeats(config.number_repeats));
        }

        if config.cores_per_node == 0 {
            return Err(ConfigError::InvalidCoresPerNode(config.cores_per_node));
        }

        if config.scheduler.poll_secs == 0 {
            return Err(ConfigError::InvalidPollPeriod(config.scheduler.poll_secs));
        }

        if config.lock.timeout_secs == 0 {
            return Err(ConfigError::InvalidLockTimeout(config.lock.timeout_secs));
        }

        if config.core_counts.contains(&0) {
            return Err(ConfigError::ZeroCoreCount);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> Config {
        Config {
            home: "/scratch/rig".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_needs_home() {
        let config = Config::default();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyHome)
        ));
        ConfigLoader::validate(&valid_config()).expect("config with home should be valid");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "home: /scratch/rig\nresource: clusterA\ncore_counts: [1, 2]\nscheduler:\n  poll_secs: 3"
        )
        .unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.home, "/scratch/rig");
        assert_eq!(config.resource, "clusterA");
        assert_eq!(config.scheduler.poll_secs, 3);
        // Defaults persist under partial files.
        assert_eq!(config.maximum_attempts, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_zero_attempts() {
        let config = Config {
            maximum_attempts: 0,
            ..valid_config()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaximumAttempts(0))
        ));
    }

    #[test]
    fn test_validate_zero_poll() {
        let mut config = valid_config();
        config.scheduler.poll_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPollPeriod(0))
        ));
    }

    #[test]
    fn test_validate_zero_core_count() {
        let mut config = valid_config();
        config.core_counts = vec![1, 0, 4];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroCoreCount)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "loud"),
            other => panic!("expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }
}
