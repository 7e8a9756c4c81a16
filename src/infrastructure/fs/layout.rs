//! Directory layout under the coordination root.
//!
//! A record's directory location encodes its lifecycle state: pending
//! records wait in `jobs/pending`, admitted records live in
//! `jobs/inprogress`, finalized records land under the per-run results
//! archive.

use std::io;
use std::path::{Path, PathBuf};

use crate::domain::errors::{RigError, RigResult};

/// Path derivations for one coordination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    home: PathBuf,
}

impl Workspace {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Recover the workspace from an active record path. Active records
    /// always live at `<home>/jobs/<area>/<name>.job`.
    pub fn infer_from_record(record_path: &Path) -> RigResult<Self> {
        let jobs = record_path.parent().and_then(Path::parent);
        match jobs {
            Some(dir) if dir.file_name().is_some_and(|n| n == "jobs") => match dir.parent() {
                Some(home) => Ok(Self::new(home)),
                None => Err(RigError::OrphanRecord(record_path.to_path_buf())),
            },
            _ => Err(RigError::OrphanRecord(record_path.to_path_buf())),
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Records waiting for admission.
    pub fn pending(&self) -> PathBuf {
        self.home.join("jobs").join("pending")
    }

    /// Records owned by a running worker.
    pub fn inprogress(&self) -> PathBuf {
        self.home.join("jobs").join("inprogress")
    }

    /// Root of the historical results archive.
    pub fn results(&self) -> PathBuf {
        self.home.join("results")
    }

    /// One run's archive directory: `results/<test>/<stamp>`.
    pub fn results_run(&self, test: &str, stamp: &str) -> PathBuf {
        self.results().join(test).join(stamp)
    }

    /// Project templates (input).
    pub fn templates(&self) -> PathBuf {
        self.home.join("templates")
    }

    /// Materialized project instances.
    pub fn instances(&self) -> PathBuf {
        self.home.join("instances")
    }

    /// Derived-properties area.
    pub fn properties(&self) -> PathBuf {
        self.home.join("properties")
    }

    /// Precondition outputs.
    pub fn data(&self) -> PathBuf {
        self.home.join("data")
    }

    /// Scratch work area.
    pub fn work(&self) -> PathBuf {
        self.home.join("work")
    }

    /// Advisory lock files.
    pub fn locks(&self) -> PathBuf {
        self.home.join("locks")
    }

    /// Fixed lock key shared by all record operations.
    pub fn default_lock_path(&self) -> PathBuf {
        self.locks().join("records.lock")
    }

    /// Scratch directory for one record name.
    pub fn scratch(&self, record_name: &str) -> PathBuf {
        self.work().join(record_name)
    }

    /// Output directory for (instance, application) precondition data.
    pub fn precondition_output(&self, instance: &str, application: &str) -> PathBuf {
        self.data().join(format!("{instance}-{application}"))
    }

    /// Record file path in the pending area.
    pub fn pending_record(&self, name: &str) -> PathBuf {
        self.pending().join(format!("{name}.job"))
    }

    /// Record file path in the in-progress area.
    pub fn inprogress_record(&self, name: &str) -> PathBuf {
        self.inprogress().join(format!("{name}.job"))
    }

    /// Create every lifecycle area that must exist before coordination
    /// starts. Idempotent.
    pub fn ensure_areas(&self) -> io::Result<()> {
        for dir in [
            self.pending(),
            self.inprogress(),
            self.results(),
            self.templates(),
            self.instances(),
            self.properties(),
            self.data(),
            self.work(),
            self.locks(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Whether a lifecycle area currently holds any record files.
    pub fn area_has_records(dir: &Path) -> bool {
        std::fs::read_dir(dir).is_ok_and(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().is_some_and(|ext| ext == "job"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let ws = Workspace::new("/rig");
        assert_eq!(ws.pending(), PathBuf::from("/rig/jobs/pending"));
        assert_eq!(ws.inprogress(), PathBuf::from("/rig/jobs/inprogress"));
        assert_eq!(
            ws.results_run("nightly", "2024-01-01_00.00.00"),
            PathBuf::from("/rig/results/nightly/2024-01-01_00.00.00")
        );
        assert_eq!(
            ws.precondition_output("basin_none_none", "prepsim"),
            PathBuf::from("/rig/data/basin_none_none-prepsim")
        );
        assert_eq!(
            ws.pending_record("basin_none_none_coresim_4_1"),
            PathBuf::from("/rig/jobs/pending/basin_none_none_coresim_4_1.job")
        );
    }

    #[test]
    fn test_infer_from_record() {
        let ws =
            Workspace::infer_from_record(Path::new("/rig/jobs/pending/a.job")).expect("infer");
        assert_eq!(ws.home(), Path::new("/rig"));

        assert!(Workspace::infer_from_record(Path::new("/tmp/a.job")).is_err());
        assert!(Workspace::infer_from_record(Path::new("/rig/results/a.job")).is_err());
    }
}
