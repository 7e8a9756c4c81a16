//! Blank adapter: the default, assumption-free suite strategy.
//!
//! Declares no memory footprint, no upstream stages, and no instance
//! instantiation work. The record's command is simply the application
//! name (expected on PATH) plus any configured extra arguments, and logs
//! are interpreted with the generic scanner grammar.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::models::{Instance, JobField};
use crate::domain::ports::SuiteAdapter;
use crate::infrastructure::fs::JobRecord;
use crate::services::logscan::LogScanner;

pub struct BlankAdapter {
    scanner: LogScanner,
}

impl BlankAdapter {
    pub fn new() -> Self {
        Self {
            scanner: LogScanner::new(),
        }
    }
}

impl Default for BlankAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuiteAdapter for BlankAdapter {
    fn name(&self) -> &'static str {
        "blank"
    }

    async fn output_available(&self, path: &Path, _template: &str) -> bool {
        path.exists()
    }

    async fn memory_requirement_mb(&self, _instance_dir: &Path, _application: &str) -> Option<u64> {
        Some(0)
    }

    async fn populate_fields(&self, record: &mut JobRecord) -> bool {
        let application = record.get_str(JobField::Application).to_string();
        if application.is_empty() {
            return false;
        }
        let args = record.get_str(JobField::AppArgs).trim().to_string();
        let command = if args.is_empty() {
            application.clone()
        } else {
            format!("{application} {args}")
        };
        record.set(JobField::Command, command);
        record.set(JobField::LogFile, format!("{application}.log"));
        true
    }

    fn precondition_applications(&self, _application: &str) -> Vec<String> {
        Vec::new()
    }

    async fn materialize_instance(&self, _instance: &Instance) -> bool {
        true
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
