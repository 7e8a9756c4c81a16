//! Shared helpers for integration tests: a disposable rig home with all
//! lifecycle areas in place.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use perfrig::domain::models::{Config, JobField};
use perfrig::infrastructure::fs::{JobRecord, LockSettings, Workspace};

pub struct TestRig {
    _tmp: TempDir,
    pub ws: Workspace,
    pub lock: LockSettings,
}

impl TestRig {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let ws = Workspace::new(tmp.path());
        ws.ensure_areas().expect("areas");
        let lock = LockSettings {
            path: ws.default_lock_path(),
            timeout: Duration::from_secs(10),
            retry: Duration::from_millis(10),
        };
        Self {
            _tmp: tmp,
            ws,
            lock,
        }
    }

    pub fn home(&self) -> &Path {
        self.ws.home()
    }

    /// Base configuration rooted at this rig, tuned for fast tests.
    pub fn config(&self) -> Config {
        let mut config = Config {
            home: self.home().display().to_string(),
            resource: "local".to_string(),
            test_name: "it".to_string(),
            ..Default::default()
        };
        config.scheduler.poll_secs = 1;
        config.scheduler.min_free_disk_mb = 0;
        config.lock.timeout_secs = 10;
        config.lock.retry_ms = 10;
        config
    }

    /// Create a template directory with the given files.
    pub fn add_template(&self, name: &str, files: &[(&str, &str)]) {
        let dir = self.ws.templates().join(name);
        std::fs::create_dir_all(&dir).expect("template dir");
        for (file, contents) in files {
            std::fs::write(dir.join(file), contents).expect("template file");
        }
    }

    /// Mint a results run directory the way the builder does.
    pub fn make_run_dir(&self, stamp: &str) -> PathBuf {
        let run = self.ws.results_run("it", stamp);
        std::fs::create_dir_all(run.join("records")).expect("records dir");
        std::fs::create_dir_all(run.join("logs")).expect("logs dir");
        run
    }

    /// Place a record file directly into `dir` with the given fields.
    pub async fn place_record(
        &self,
        dir: &Path,
        name: &str,
        fields: &[(JobField, String)],
    ) -> PathBuf {
        let path = dir.join(format!("{name}.job"));
        let mut record = JobRecord::open(&path, &self.lock);
        for (field, value) in fields {
            record.set(*field, value);
        }
        record.create().await.expect("record create");
        path
    }

    /// Names (stems) of the record files in a directory, sorted.
    pub fn record_names(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "job"))
                    .filter_map(|e| {
                        e.path()
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Read a record wherever it currently is, without assumptions.
    pub async fn read_record(&self, path: &Path) -> JobRecord {
        let mut record = JobRecord::open(path, &self.lock);
        record.acquire().await.expect("acquire");
        record.release().await;
        record
    }

    /// Find the single archived record for `name` under the results tree.
    pub fn archived_record(&self, name: &str) -> Option<PathBuf> {
        let file_name = format!("{name}.job");
        walkdir::WalkDir::new(self.ws.results())
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .find(|p| {
                p.file_name().is_some_and(|n| n.to_string_lossy() == file_name)
                    && p.parent()
                        .and_then(|d| d.file_name())
                        .is_some_and(|n| n == "records")
            })
    }
}
