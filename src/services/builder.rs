//! Precondition graph builder.
//!
//! Expands the configured test matrix (template x parameter value x
//! application x core count x repeat) into job records in the pending
//! area, pruning infeasible shapes and de-duplicating by canonical record
//! name. Applications with upstream stages get precondition records,
//! which bypass de-duplication entirely.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Local;
use walkdir::WalkDir;

use crate::domain::errors::RigResult;
use crate::domain::models::job::record_name;
use crate::domain::models::{Config, Instance, JobField, JobResult, JobState, ResourceLimits};
use crate::domain::ports::SuiteAdapter;
use crate::infrastructure::fs::{peek_result, JobRecord, LockSettings, Workspace};
use crate::services::instance::Materializer;

/// Counters reported after one builder run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Records placed in the pending area.
    pub created: u32,
    /// Combinations skipped (duplicate, infeasible, run-once, vetoed).
    pub skipped: u32,
    /// How many of the created records are precondition records.
    pub preconditions: u32,
}

/// One (instance, application, cores, repeat) shape awaiting placement.
struct WorkItem {
    instance: Instance,
    application: String,
    cores: u32,
    repeat: u32,
    memory_mb: u64,
    is_precondition: bool,
}

pub struct GraphBuilder {
    config: Config,
    limits: ResourceLimits,
    adapter: Arc<dyn SuiteAdapter>,
    ws: Workspace,
    lock: LockSettings,
}

impl GraphBuilder {
    pub fn new(config: Config, limits: ResourceLimits, adapter: Arc<dyn SuiteAdapter>) -> Self {
        let ws = Workspace::new(&config.home);
        let lock = LockSettings::from_config(&config.lock, &ws);
        Self {
            config,
            limits,
            adapter,
            ws,
            lock,
        }
    }

    /// Run the expansion once. Mints this run's results area and returns
    /// placement counters.
    pub async fn build(&self) -> RigResult<BuildSummary> {
        self.ws.ensure_areas()?;

        let stamp = Local::now().format("%Y-%m-%d_%H.%M.%S").to_string();
        let run_dir = self.ws.results_run(&self.config.test_name, &stamp);
        std::fs::create_dir_all(run_dir.join("records"))?;
        std::fs::create_dir_all(run_dir.join("logs"))?;

        let materializer = Materializer::new(self.ws.clone(), Arc::clone(&self.adapter));
        let mut summary = BuildSummary::default();

        for template in &self.config.templates {
            for value in self.config.effective_param_values() {
                let instance =
                    Instance::new(template, &self.config.param_id, &value, &self.ws.instances());
                if !materializer.materialize(&instance).await? {
                    // Whole (template, value) branch abandoned.
                    continue;
                }

                for application in &self.config.applications {
                    let Some(memory_mb) = self
                        .adapter
                        .memory_requirement_mb(&instance.dir, application)
                        .await
                    else {
                        tracing::debug!(
                            instance = %instance.name,
                            application,
                            "memory requirement undeterminable, skipping application"
                        );
                        continue;
                    };

                    let mut queue: VecDeque<WorkItem> = VecDeque::new();
                    for &cores in &self.config.core_counts {
                        for repeat in 1..=self.config.number_repeats {
                            queue.push_back(WorkItem {
                                instance: instance.clone(),
                                application: application.clone(),
                                cores,
                                repeat,
                                memory_mb,
                                is_precondition: false,
                            });
                        }
                    }

                    while let Some(item) = queue.pop_front() {
                        if self.place_record(&item, &run_dir).await? {
                            summary.created += 1;
                            if item.is_precondition {
                                summary.preconditions += 1;
                            }
                        } else {
                            summary.skipped += 1;
                        }
                        self.enqueue_preconditions(&item, &mut queue).await;
                    }
                }
            }
        }

        tracing::info!(
            created = summary.created,
            skipped = summary.skipped,
            preconditions = summary.preconditions,
            run = %run_dir.display(),
            "graph build complete"
        );
        Ok(summary)
    }

    /// Queue precondition records for every upstream application whose
    /// output does not yet exist. Preconditions recurse through the same
    /// queue, so transitive stages are covered.
    async fn enqueue_preconditions(&self, item: &WorkItem, queue: &mut VecDeque<WorkItem>) {
        for upstream in self.adapter.precondition_applications(&item.application) {
            let output = self
                .ws
                .precondition_output(&item.instance.name, &upstream);
            if self
                .adapter
                .output_available(&output, &item.instance.template)
                .await
            {
                continue;
            }
            let Some(memory_mb) = self
                .adapter
                .memory_requirement_mb(&item.instance.dir, &upstream)
                .await
            else {
                tracing::warn!(
                    instance = %item.instance.name,
                    upstream,
                    "precondition memory requirement undeterminable, skipping"
                );
                continue;
            };
            let cores = self.limits.precondition_cores(memory_mb);
            tracing::debug!(
                instance = %item.instance.name,
                upstream,
                cores,
                "queueing precondition record"
            );
            queue.push_back(WorkItem {
                instance: item.instance.clone(),
                application: upstream,
                cores,
                repeat: 1,
                memory_mb,
                is_precondition: true,
            });
        }
    }

    /// Place one record in the pending area, honoring the de-duplication
    /// and feasibility rules. Returns whether a record was created.
    async fn place_record(&self, item: &WorkItem, run_dir: &std::path::Path) -> RigResult<bool> {
        let name = record_name(&item.instance.name, &item.application, item.cores, item.repeat);

        if !item.is_precondition {
            if self.ws.pending_record(&name).exists() || self.ws.inprogress_record(&name).exists() {
                tracing::debug!(record = %name, "record already queued, skipping");
                return Ok(false);
            }
            if self.config.run_once && self.prior_success(&name) {
                tracing::debug!(record = %name, "prior success archived, run-once skip");
                return Ok(false);
            }
        }

        if item.cores > self.limits.core_limit {
            tracing::debug!(
                record = %name,
                cores = item.cores,
                core_limit = self.limits.core_limit,
                "over the core limit, skipping"
            );
            return Ok(false);
        }
        if !self.limits.feasible(item.cores, item.memory_mb) {
            tracing::debug!(
                record = %name,
                memory_mb = item.memory_mb,
                cores = item.cores,
                "memory requirement over budget, skipping"
            );
            return Ok(false);
        }

        let upstreams = self
            .adapter
            .precondition_applications(&item.application)
            .join(" ");

        let mut record = JobRecord::open(self.ws.pending_record(&name), &self.lock);
        record.reset();
        record.set(JobField::Template, &item.instance.template);
        record.set(JobField::Instance, &item.instance.name);
        record.set(JobField::Application, &item.application);
        record.set(JobField::ParamId, &item.instance.param_id);
        record.set(JobField::ParamValue, &item.instance.param_value);
        record.set(JobField::Cores, item.cores);
        record.set(JobField::Resource, &self.limits.name);
        record.set(JobField::MemoryMb, item.memory_mb);
        record.set(JobField::Home, self.ws.home().display());
        record.set(JobField::Test, &self.config.test_name);
        record.set(JobField::Adapter, self.adapter.name());
        record.set(JobField::AppVersion, &self.config.app_version);
        record.set(JobField::AppArgs, &self.config.app_args);
        record.set(JobField::InputDir, item.instance.dir.display());
        record.set(
            JobField::OutputDir,
            self.ws
                .precondition_output(&item.instance.name, &item.application)
                .display(),
        );
        record.set(JobField::ResultsDir, run_dir.display());
        record.set(JobField::WorkDir, self.ws.scratch(&name).display());
        record.set(JobField::Precondition, upstreams);
        record.set(JobField::Attempts, 0);
        record.set(JobField::MaxAttempts, self.config.maximum_attempts);
        record.set(JobField::State, JobState::Pending.as_str());
        record.set(JobField::CreatedAt, chrono::Utc::now().to_rfc3339());

        if !self.adapter.populate_fields(&mut record).await {
            tracing::warn!(record = %name, "adapter vetoed record, skipping");
            return Ok(false);
        }

        record.create().await?;
        tracing::info!(
            record = %name,
            cores = item.cores,
            precondition = item.is_precondition,
            "record created"
        );
        Ok(true)
    }

    /// Whether any archived record with this name ended in SUCCESS.
    /// Walks the entire historical results archive on every call; the
    /// full-history semantics are part of the contract.
    fn prior_success(&self, name: &str) -> bool {
        let file_name = format!("{name}.job");
        WalkDir::new(self.ws.results())
            .follow_links(false)
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy() == file_name)
            .filter(|e| {
                e.path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .is_some_and(|n| n == "records")
            })
            .any(|e| peek_result(e.path()) == JobResult::Success)
    }
}
