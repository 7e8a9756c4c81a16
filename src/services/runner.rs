//! Execution wrapper: runs one job record to completion.
//!
//! Per-attempt state machine: RESET -> PREPARE_WORKDIR -> RUN -> VERIFY ->
//! (RETRY -> RESET | FINALIZE). The wrapper owns its record for the whole
//! process lifetime but holds the advisory lock only across individual
//! read-modify-write windows, never across the external command.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use tokio::process::Command;

use crate::domain::errors::{RigError, RigResult};
use crate::domain::models::{JobField, JobResult, JobState};
use crate::infrastructure::fs::{
    archive_with_suffix, copy_tree, dir_size_kb, JobRecord, LockSettings, Workspace,
};

/// Fallback log name when a record declares none.
const DEFAULT_LOG_NAME: &str = "run.log";

/// Static facts read from the record once at bind time. Only the owning
/// worker mutates a record, so these cannot change underneath us.
struct JobShape {
    command: String,
    log_name: String,
    input_dir: PathBuf,
    work_dir: PathBuf,
    output_dir: PathBuf,
    results_dir: PathBuf,
    max_attempts: i64,
    initial_attempts: i64,
    instance: String,
    application: String,
    cores: i64,
}

pub struct ExecutionWrapper {
    record: JobRecord,
    ws: Workspace,
    adapter: Arc<dyn crate::domain::ports::SuiteAdapter>,
    shape: JobShape,
}

impl ExecutionWrapper {
    /// Bind to a record file, resolving the workspace from its location
    /// and the adapter from its ADAPTER field.
    pub async fn bind(record_path: &Path) -> RigResult<Self> {
        let ws = Workspace::infer_from_record(record_path)?;
        let lock = LockSettings::new(ws.default_lock_path());
        let mut record = JobRecord::open(record_path, &lock);
        record.acquire().await?;

        let adapter_name = record.get_str(JobField::Adapter).to_string();
        let shape = JobShape {
            command: record.get_str(JobField::Command).to_string(),
            log_name: match record.get_str(JobField::LogFile) {
                "" => DEFAULT_LOG_NAME.to_string(),
                name => name.to_string(),
            },
            input_dir: PathBuf::from(record.get_str(JobField::InputDir)),
            work_dir: PathBuf::from(record.get_str(JobField::WorkDir)),
            output_dir: PathBuf::from(record.get_str(JobField::OutputDir)),
            results_dir: PathBuf::from(record.get_str(JobField::ResultsDir)),
            max_attempts: record.get_i64(JobField::MaxAttempts).max(1),
            initial_attempts: record.get_i64(JobField::Attempts).max(0),
            instance: record.get_str(JobField::Instance).to_string(),
            application: record.get_str(JobField::Application).to_string(),
            cores: record.get_i64(JobField::Cores),
        };
        record.release().await;

        let adapter = crate::adapters::create(&adapter_name)
            .ok_or_else(|| RigError::UnknownAdapter(adapter_name.clone()))?;

        Ok(Self {
            record,
            ws,
            adapter,
            shape,
        })
    }

    /// Run attempts until success or exhaustion, then finalize into the
    /// results archive. An exhausted record is finalized as FAILURE,
    /// never left stranded. A record that already reached its ceiling is
    /// never attempted again, regardless of result.
    pub async fn run(&mut self) -> RigResult<()> {
        let mut attempts = self.shape.initial_attempts;
        let mut success = false;
        while attempts < self.shape.max_attempts {
            let (done, ok) = self.attempt().await?;
            attempts = done;
            success = ok;
            if success {
                break;
            }
            if attempts < self.shape.max_attempts {
                tracing::info!(record = %self.record.name(), attempts, "retrying");
            }
        }
        if !success {
            tracing::warn!(
                record = %self.record.name(),
                attempts,
                "attempts exhausted, finalizing as FAILURE"
            );
        }
        self.finalize().await
    }

    /// One pass through RESET .. VERIFY. Returns (attempts so far,
    /// combined success).
    async fn attempt(&mut self) -> RigResult<(i64, bool)> {
        // RESET: clear the per-attempt outcome fields.
        self.record.acquire().await?;
        for field in [
            JobField::Result,
            JobField::ExitCode,
            JobField::VerifyCode,
            JobField::WallSecs,
            JobField::StartedAt,
            JobField::StoppedAt,
        ] {
            self.record.clear(field);
        }
        self.record.set(JobField::State, JobState::InProgress.as_str());
        self.record.set(JobField::Hostname, read_proc_line("/proc/sys/kernel/hostname"));
        self.record.set(JobField::OsRelease, read_proc_line("/proc/sys/kernel/osrelease"));
        self.record.release().await;

        // PREPARE_WORKDIR: private scratch copy of the input tree. A
        // missing input directory is a fatal abort; the record stays in
        // the in-progress area for the operator.
        if !self.shape.input_dir.exists() {
            tracing::error!(
                record = %self.record.name(),
                input = %self.shape.input_dir.display(),
                "input directory missing, aborting"
            );
            return Err(RigError::InputMissing(self.shape.input_dir.clone()));
        }
        if self.shape.work_dir.exists() {
            std::fs::remove_dir_all(&self.shape.work_dir)?;
        }
        copy_tree(&self.shape.input_dir, &self.shape.work_dir)?;

        // RUN: detached shell command, combined output to the log file.
        let started = Utc::now();
        self.record.acquire().await?;
        self.record.set(JobField::StartedAt, started.to_rfc3339());
        self.record.release().await;

        let log_path = self.shape.work_dir.join(&self.shape.log_name);
        let exit_code = self.run_command(&log_path).await?;
        let stopped = Utc::now();

        // VERIFY and per-attempt bookkeeping.
        self.record.acquire().await?;
        let verdict = self.adapter.parse_log(&mut self.record, &log_path).await;
        let success = exit_code == 0 && verdict == 0;

        self.record.set(JobField::ExitCode, exit_code);
        self.record.set(JobField::VerifyCode, verdict);
        self.record.set(JobField::StoppedAt, stopped.to_rfc3339());
        self.record.set(
            JobField::WallSecs,
            (stopped - started).num_seconds().max(0),
        );
        self.record
            .set(JobField::DirSizeKb, dir_size_kb(&self.shape.work_dir));
        let attempts = self.record.get_i64(JobField::Attempts).max(0) + 1;
        self.record.set(JobField::Attempts, attempts);
        self.record.set(
            JobField::Result,
            if success {
                JobResult::Success.as_str()
            } else {
                JobResult::Failure.as_str()
            },
        );
        if !success {
            // A retry must measure fresh elapsed time.
            self.record.clear(JobField::StartedAt);
        }

        // Archive the log out of the scratch tree.
        if log_path.exists() {
            let logs_dir = self.shape.results_dir.join("logs");
            std::fs::create_dir_all(&logs_dir)?;
            let archived = archive_with_suffix(&log_path, &logs_dir, &self.shape.log_name)?;
            self.record.set(JobField::LogFile, archived.display());
            tracing::debug!(record = %self.record.name(), log = %archived.display(), "log archived");
        }

        if success {
            self.write_properties();
        }
        self.record.release().await;

        // Scratch disposition: successful output becomes precondition
        // data unless that path is already populated; the scratch
        // directory never survives the attempt.
        if success && !self.shape.output_dir.exists() {
            if let Some(parent) = self.shape.output_dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&self.shape.work_dir, &self.shape.output_dir)?;
        }
        if self.shape.work_dir.exists() {
            std::fs::remove_dir_all(&self.shape.work_dir)?;
        }

        tracing::info!(
            record = %self.record.name(),
            attempt = attempts,
            exit_code,
            verdict,
            success,
            "attempt finished"
        );
        Ok((attempts, success))
    }

    async fn run_command(&self, log_path: &Path) -> RigResult<i64> {
        let log = std::fs::File::create(log_path)?;
        let log_err = log.try_clone()?;
        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.shape.command)
            .current_dir(&self.shape.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|source| RigError::SpawnFailed {
                record: self.record.name(),
                source,
            })?
            .wait()
            .await?;
        Ok(status.code().map_or(-1, i64::from))
    }

    /// Persist scanner metrics to the derived-properties area.
    fn write_properties(&self) {
        let name = format!("{}_{}.prop", self.shape.instance, self.shape.cores);
        let path = self.ws.properties().join(name);
        let mut out = String::new();
        for field in [
            JobField::Instance,
            JobField::Application,
            JobField::Cores,
            JobField::AppDurationSecs,
            JobField::Nodes,
            JobField::Iterations,
            JobField::Loops,
            JobField::OutputSizeKb,
        ] {
            let value = self.record.get_str(field);
            if !value.is_empty() {
                out.push_str(&format!("{} = {}\n", field.key(), value));
            }
        }
        if let Err(e) = std::fs::write(&path, out) {
            tracing::warn!(path = %path.display(), error = %e, "property write failed");
        }
    }

    /// Terminal action: stamp the final state and relocate the record
    /// into the run's results record directory.
    async fn finalize(&mut self) -> RigResult<()> {
        self.record.acquire().await?;
        self.record
            .set(JobField::State, JobState::Completed.as_str());
        self.record.release().await;

        let records_dir = self.shape.results_dir.join("records");
        std::fs::create_dir_all(&records_dir)?;
        self.record.relocate(&records_dir).await?;
        tracing::info!(
            record = %self.record.name(),
            dest = %records_dir.display(),
            "record finalized"
        );
        Ok(())
    }
}

fn read_proc_line(path: &str) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
