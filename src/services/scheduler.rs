//! Admission controller / scheduler loop.
//!
//! A single controller process polls the pending area, admits records
//! that fit the remaining core and disk budget, and spawns one detached
//! worker process per admitted record. Workers are fire-and-forget: the
//! controller reaps them non-blockingly to keep the process table clean
//! but never consults their exit status - outcomes are read back from
//! record content only.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::domain::errors::{RigError, RigResult};
use crate::domain::models::{Config, JobField, ResourceLimits};
use crate::infrastructure::fs::{free_disk_mb, JobRecord, LockSettings, Workspace};

/// One spawned worker under observation.
struct TrackedWorker {
    record: String,
    child: Child,
}

pub struct Scheduler {
    config: Config,
    limits: ResourceLimits,
    ws: Workspace,
    lock: LockSettings,
    workers: Vec<TrackedWorker>,
}

impl Scheduler {
    pub fn new(config: Config, limits: ResourceLimits) -> Self {
        let ws = Workspace::new(&config.home);
        let lock = LockSettings::from_config(&config.lock, &ws);
        Self {
            config,
            limits,
            ws,
            lock,
            workers: Vec::new(),
        }
    }

    /// Run admission cycles until both lifecycle areas are empty or an
    /// interrupt arrives. In-flight workers are never killed; they
    /// finalize on their own.
    pub async fn run(&mut self) -> RigResult<()> {
        self.ws.ensure_areas()?;
        let poll = Duration::from_secs(self.config.scheduler.poll_secs);

        loop {
            self.reap();

            if !Workspace::area_has_records(&self.ws.pending())
                && !Workspace::area_has_records(&self.ws.inprogress())
            {
                tracing::info!("pending and in-progress areas drained, stopping");
                break;
            }

            let available = self.available_cores().await?;
            let free_mb = free_disk_mb(&self.ws.work())?;
            if available <= 0 || free_mb < self.config.scheduler.min_free_disk_mb {
                tracing::debug!(
                    available,
                    free_mb,
                    "capacity exhausted, skipping admission this cycle"
                );
            } else {
                self.admit_cycle(available).await?;
            }

            tokio::select! {
                () = tokio::time::sleep(poll) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(
                        workers = self.workers.len(),
                        "interrupted; leaving in-flight workers to finalize on their own"
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Non-blocking reap of finished children. Exit statuses are logged
    /// but never interpreted.
    fn reap(&mut self) {
        self.workers.retain_mut(|worker| match worker.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(record = %worker.record, %status, "worker reaped");
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(record = %worker.record, error = %e, "reap failed, dropping handle");
                false
            }
        });
    }

    /// Cores still available on this resource: the configured limit minus
    /// everything admitted, rounded up to whole nodes when the resource
    /// is dedicated.
    async fn available_cores(&self) -> RigResult<i64> {
        let mut in_use: i64 = 0;
        let entries = std::fs::read_dir(self.ws.inprogress())?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "job") {
                continue;
            }
            let mut record = JobRecord::open(&path, &self.lock);
            record.acquire().await?;
            if record.get_str(JobField::Resource) == self.limits.name {
                let cores = record.get_i64(JobField::Cores);
                if cores > 0 {
                    in_use += self.rounded(cores);
                }
            }
            record.release().await;
        }
        Ok(i64::from(self.limits.core_limit) - in_use)
    }

    /// Round a core count up to a whole-node multiple when the resource
    /// practices dedicated-node allocation.
    fn rounded(&self, cores: i64) -> i64 {
        if self.config.dedicated_nodes {
            let node = i64::from(self.config.cores_per_node.max(1));
            // Stable equivalent of signed `i64::div_ceil` (node is always >= 1).
            let quot = cores / node;
            let ceil = if cores % node > 0 { quot + 1 } else { quot };
            ceil * node
        } else {
            cores
        }
    }

    /// Scan the pending area in raw directory-listing order and admit
    /// whatever fits. No fairness: listing order is
    /// filesystem-dependent, by design.
    async fn admit_cycle(&mut self, mut available: i64) -> RigResult<()> {
        let entries = std::fs::read_dir(self.ws.pending())?;
        for entry in entries.flatten() {
            if available <= 0 {
                break;
            }
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "job") {
                continue;
            }

            let mut record = JobRecord::open(&path, &self.lock);
            record.acquire().await?;
            let admit = self.check_candidate(&record, available);
            record.release().await;

            let Some(cores) = admit else { continue };

            record.relocate(&self.ws.inprogress()).await?;
            match self.spawn_worker(record.path()) {
                Ok(child) => {
                    available -= self.rounded(cores);
                    tracing::info!(
                        record = %record.name(),
                        cores,
                        available,
                        "admitted"
                    );
                    self.workers.push(TrackedWorker {
                        record: record.name(),
                        child,
                    });
                }
                Err(e) => {
                    // Put the record back so it is retried next cycle
                    // instead of sitting ownerless in the in-progress area.
                    tracing::error!(record = %record.name(), error = %e, "worker spawn failed");
                    record.relocate(&self.ws.pending()).await?;
                }
            }
        }
        Ok(())
    }

    /// Admission rules for one pending record. Returns the core count to
    /// charge when the record should be admitted.
    fn check_candidate(&self, record: &JobRecord, available: i64) -> Option<i64> {
        let name = record.name();

        if record.get_str(JobField::Resource) != self.limits.name {
            tracing::debug!(
                record = %name,
                theirs = record.get_str(JobField::Resource),
                ours = %self.limits.name,
                "different resource, skipping"
            );
            return None;
        }

        let cores = record.get_i64(JobField::Cores);
        if cores < 0 {
            tracing::warn!(record = %name, cores, "invalid processor count, skipping");
            return None;
        }
        if self.rounded(cores) > available {
            tracing::debug!(record = %name, cores, available, "does not fit, skipping");
            return None;
        }

        let instance = record.get_str(JobField::Instance);
        for upstream in record.get_str(JobField::Precondition).split_whitespace() {
            let output = self.ws.precondition_output(instance, upstream);
            if !output.exists() {
                tracing::debug!(
                    record = %name,
                    upstream,
                    "precondition output missing, staying pending"
                );
                return None;
            }
        }

        Some(cores)
    }

    /// Spawn one detached worker bound to a record. The worker gets its
    /// own process group so an interrupt aimed at the controller never
    /// reaches it.
    fn spawn_worker(&self, record_path: &std::path::Path) -> RigResult<Child> {
        Command::new(self.worker_executable())
            .arg(record_path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| RigError::SpawnFailed {
                record: record_path.display().to_string(),
                source,
            })
    }

    fn worker_executable(&self) -> PathBuf {
        if let Some(ref path) = self.config.scheduler.worker_path {
            return PathBuf::from(path);
        }
        // Default to the worker binary installed next to this executable.
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("perfrig-worker")))
            .unwrap_or_else(|| PathBuf::from("perfrig-worker"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;

    fn scheduler(dedicated: bool, cores_per_node: u32) -> Scheduler {
        let config = Config {
            home: "/tmp/rig-test".to_string(),
            dedicated_nodes: dedicated,
            cores_per_node,
            ..Default::default()
        };
        let limits = ResourceLimits::new("local", 64, 4096);
        Scheduler::new(config, limits)
    }

    #[test]
    fn test_rounding_shared_resource() {
        let s = scheduler(false, 8);
        assert_eq!(s.rounded(3), 3);
        assert_eq!(s.rounded(8), 8);
    }

    #[test]
    fn test_rounding_dedicated_resource() {
        let s = scheduler(true, 8);
        assert_eq!(s.rounded(1), 8);
        assert_eq!(s.rounded(8), 8);
        assert_eq!(s.rounded(9), 16);
    }

    #[test]
    fn test_worker_executable_override() {
        let mut s = scheduler(false, 1);
        s.config.scheduler.worker_path = Some("/opt/rig/bin/perfrig-worker".to_string());
        assert_eq!(
            s.worker_executable(),
            PathBuf::from("/opt/rig/bin/perfrig-worker")
        );
    }
}
