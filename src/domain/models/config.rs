//! Configuration model for the perfrig tools.

use serde::{Deserialize, Serialize};

/// Main configuration structure, shared by the builder and the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Coordination root. Every lifecycle area lives under this path.
    #[serde(default)]
    pub home: String,

    /// Resource (compute pool) this deployment serves.
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Test campaign name, used to group the results archive.
    #[serde(default = "default_test_name")]
    pub test_name: String,

    /// Application-suite adapter selection.
    #[serde(default = "default_adapter")]
    pub adapter: String,

    /// Suppress record creation when a prior SUCCESS exists in the archive.
    #[serde(default)]
    pub run_once: bool,

    /// Retry ceiling per job.
    #[serde(default = "default_maximum_attempts")]
    pub maximum_attempts: u32,

    /// Repeats of each matrix combination.
    #[serde(default = "default_number_repeats")]
    pub number_repeats: u32,

    /// Cores per physical node, for dedicated-node rounding.
    #[serde(default = "default_cores_per_node")]
    pub cores_per_node: u32,

    /// Whether the resource hands out whole nodes.
    #[serde(default)]
    pub dedicated_nodes: bool,

    /// Project templates to expand.
    #[serde(default)]
    pub templates: Vec<String>,

    /// Applications (job classes) to run per instance.
    #[serde(default)]
    pub applications: Vec<String>,

    /// Core counts to sweep.
    #[serde(default)]
    pub core_counts: Vec<u32>,

    /// Varied parameter id; `none` disables parametrization.
    #[serde(default = "default_param_id")]
    pub param_id: String,

    /// Values swept for the varied parameter.
    #[serde(default)]
    pub param_values: Vec<String>,

    /// Application release stamped into records.
    #[serde(default)]
    pub app_version: String,

    /// Extra arguments appended to every simulation command.
    #[serde(default)]
    pub app_args: String,

    /// Resource descriptor directory; defaults to `<home>/resources`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_dir: Option<String>,

    /// Scheduler loop configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Advisory lock configuration.
    #[serde(default)]
    pub lock: LockConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_resource() -> String {
    "local".to_string()
}

fn default_test_name() -> String {
    "default".to_string()
}

fn default_adapter() -> String {
    "blank".to_string()
}

const fn default_maximum_attempts() -> u32 {
    1
}

const fn default_number_repeats() -> u32 {
    1
}

const fn default_cores_per_node() -> u32 {
    1
}

fn default_param_id() -> String {
    "none".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: String::new(),
            resource: default_resource(),
            test_name: default_test_name(),
            adapter: default_adapter(),
            run_once: false,
            maximum_attempts: default_maximum_attempts(),
            number_repeats: default_number_repeats(),
            cores_per_node: default_cores_per_node(),
            dedicated_nodes: false,
            templates: vec![],
            applications: vec![],
            core_counts: vec![],
            param_id: default_param_id(),
            param_values: vec![],
            app_version: String::new(),
            app_args: String::new(),
            resources_dir: None,
            scheduler: SchedulerConfig::default(),
            lock: LockConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parameter values to sweep; an empty selection collapses to the
    /// single `none` value so the matrix loops stay uniform.
    pub fn effective_param_values(&self) -> Vec<String> {
        if self.param_id == "none" || self.param_values.is_empty() {
            vec!["none".to_string()]
        } else {
            self.param_values.clone()
        }
    }
}

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Poll period between admission cycles, in seconds.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// Free-disk floor on the work area; below this admission pauses.
    #[serde(default = "default_min_free_disk_mb")]
    pub min_free_disk_mb: u64,

    /// Worker executable override. Defaults to `perfrig-worker` next to
    /// the scheduler binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_path: Option<String>,
}

const fn default_poll_secs() -> u64 {
    10
}

const fn default_min_free_disk_mb() -> u64 {
    1024
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
            min_free_disk_mb: default_min_free_disk_mb(),
            worker_path: None,
        }
    }
}

/// Advisory lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LockConfig {
    /// Lock file path override. Defaults to `<home>/locks/records.lock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Bound on lock acquisition, in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub timeout_secs: u64,

    /// Initial retry interval between acquisition attempts, in ms.
    #[serde(default = "default_lock_retry_ms")]
    pub retry_ms: u64,
}

const fn default_lock_timeout_secs() -> u64 {
    300
}

const fn default_lock_retry_ms() -> u64 {
    250
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_lock_timeout_secs(),
            retry_ms: default_lock_retry_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty or json.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for a daily-rolling log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.adapter, "blank");
        assert_eq!(config.maximum_attempts, 1);
        assert_eq!(config.scheduler.poll_secs, 10);
        assert_eq!(config.lock.timeout_secs, 300);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_effective_param_values_collapse() {
        let mut config = Config::default();
        assert_eq!(config.effective_param_values(), vec!["none"]);

        config.param_id = "gridres".to_string();
        // id set but no values: still collapses
        assert_eq!(config.effective_param_values(), vec!["none"]);

        config.param_values = vec!["100".to_string(), "200".to_string()];
        assert_eq!(config.effective_param_values(), vec!["100", "200"]);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
home: /scratch/rig
resource: clusterA
test_name: nightly
maximum_attempts: 3
templates: [basin]
applications: [coresim]
core_counts: [1, 4, 16]
scheduler:
  poll_secs: 5
lock:
  timeout_secs: 60
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.home, "/scratch/rig");
        assert_eq!(config.resource, "clusterA");
        assert_eq!(config.maximum_attempts, 3);
        assert_eq!(config.core_counts, vec![1, 4, 16]);
        assert_eq!(config.scheduler.poll_secs, 5);
        assert_eq!(config.scheduler.min_free_disk_mb, 1024);
        assert_eq!(config.lock.timeout_secs, 60);
    }
}
