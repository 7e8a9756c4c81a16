//! Application-suite port - interface for application-specific behavior.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::models::Instance;
use crate::infrastructure::fs::JobRecord;

/// Trait for application-suite adapters.
///
/// Everything the core cannot know about a concrete simulation suite lives
/// behind this interface: memory estimation, instance instantiation,
/// command construction, upstream stages, and log interpretation. One
/// implementation is selected by name at process start (see
/// [`crate::adapters::create`]); the selection is recorded on every job so
/// workers resolve the same strategy.
#[async_trait]
pub trait SuiteAdapter: Send + Sync {
    /// Adapter name, as referenced from configuration and records.
    fn name(&self) -> &'static str;

    /// Whether usable output for `template` already exists at `path`.
    async fn output_available(&self, path: &Path, template: &str) -> bool;

    /// Memory required to run `application` against this instance, in MB.
    /// `None` means the requirement cannot be determined and the
    /// application must be skipped.
    async fn memory_requirement_mb(&self, instance_dir: &Path, application: &str) -> Option<u64>;

    /// Contribute application-specific fields (COMMAND, LOG_FILE, ...) to
    /// a record under construction. Returning `false` vetoes creation.
    async fn populate_fields(&self, record: &mut JobRecord) -> bool;

    /// Upstream applications whose output must exist before `application`
    /// may run. Empty means no preconditions.
    fn precondition_applications(&self, application: &str) -> Vec<String>;

    /// Apply the instance's parameter selection to a freshly copied
    /// template tree. Returning `false` abandons the instance.
    async fn materialize_instance(&self, instance: &Instance) -> bool;

    /// Interpret the log at `log_path`, updating derived metric fields on
    /// the record as a side effect. Returns the verdict: 0 is success.
    async fn parse_log(&self, record: &mut JobRecord, log_path: &Path) -> i32;

    /// Extract the simulation-reported elapsed time from a log, in
    /// seconds. `None` means no recognized success marker was found.
    async fn extract_duration(&self, log_path: &Path) -> Option<f64>;
}
