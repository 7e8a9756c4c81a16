//! Staged adapter: a three-stage MPI simulation pipeline.
//!
//! Stages run in order `prepsim -> coresim -> migsim`; each later stage
//! requires the previous stage's output as precondition data. Memory
//! estimates are read from `<instance>/<application>.mem` (a single
//! integer, MB); a missing estimate marks the application
//! undeterminable. Parameter selection is applied by rewriting the
//! instance's `project.conf`.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::models::{Instance, JobField};
use crate::domain::ports::SuiteAdapter;
use crate::infrastructure::fs::JobRecord;
use crate::services::logscan::LogScanner;

/// Stage table: application name and its upstream stages.
const STAGES: &[(&str, &[&str])] = &[
    ("prepsim", &[]),
    ("coresim", &["prepsim"]),
    ("migsim", &["coresim"]),
];

/// Project file rewritten during instantiation.
const PROJECT_FILE: &str = "project.conf";

pub struct StagedAdapter {
    scanner: LogScanner,
}

impl StagedAdapter {
    pub fn new() -> Self {
        Self {
            scanner: LogScanner::new(),
        }
    }
}

impl Default for StagedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuiteAdapter for StagedAdapter {
    fn name(&self) -> &'static str {
        "staged"
    }

    async fn output_available(&self, path: &Path, _template: &str) -> bool {
        // Output is usable only when the stage actually produced files.
        std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
    }

    async fn memory_requirement_mb(&self, instance_dir: &Path, application: &str) -> Option<u64> {
        let estimate = instance_dir.join(format!("{application}.mem"));
        let text = tokio::fs::read_to_string(&estimate).await.ok()?;
        text.trim().parse().ok()
    }

    async fn populate_fields(&self, record: &mut JobRecord) -> bool {
        let application = record.get_str(JobField::Application).to_string();
        let cores = record.get_i64(JobField::Cores);
        if application.is_empty() || cores <= 0 {
            return false;
        }
        let args = record.get_str(JobField::AppArgs).trim().to_string();
        let mut command = format!("mpirun -np {cores} {application} {PROJECT_FILE}");
        if !args.is_empty() {
            command.push(' ');
            command.push_str(&args);
        }
        record.set(JobField::Command, command);
        record.set(JobField::LogFile, format!("{application}.log"));
        true
    }

    fn precondition_applications(&self, application: &str) -> Vec<String> {
        STAGES
            .iter()
            .find(|(name, _)| *name == application)
            .map(|(_, upstream)| upstream.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    async fn materialize_instance(&self, instance: &Instance) -> bool {
        let project = instance.dir.join(PROJECT_FILE);
        let Ok(text) = tokio::fs::read_to_string(&project).await else {
            tracing::warn!(
                instance = %instance.name,
                file = PROJECT_FILE,
                "project file missing, cannot instantiate"
            );
            return false;
        };
        let rewritten = substitute_parameter(&text, &instance.param_id, &instance.param_value);
        tokio::fs::write(&project, rewritten).await.is_ok()
    }

    async fn parse_log(&self, record: &mut JobRecord, log_path: &Path) -> i32 {
        match self.scanner.scan_file(log_path).await {
            Ok(report) => {
                report.apply_to(record);
                report.verdict
            }
            Err(e) => {
                tracing::warn!(log = %log_path.display(), error = %e, "log unreadable");
                2
            }
        }
    }

    async fn extract_duration(&self, log_path: &Path) -> Option<f64> {
        self.scanner.extract_duration(log_path).await
    }
}

/// Replace the `<id> = ...` assignment in project text, appending one
/// when the parameter is not present yet.
fn substitute_parameter(text: &str, param_id: &str, value: &str) -> String {
    let mut found = false;
    let mut out: Vec<String> = text
        .lines()
        .map(|line| {
            let is_param = line
                .split_once('=')
                .is_some_and(|(key, _)| key.trim() == param_id);
            if is_param {
                found = true;
                format!("{param_id} = {value}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        out.push(format!("{param_id} = {value}"));
    }
    out.join("\n") + "\n"
}
