//! Job record persistence.
//!
//! A record is one plain-text file of `KEY = VALUE` lines, one per
//! populated field; empty fields are omitted entirely. The declared key
//! set is fixed ([`JobField`]): unknown keys are dropped on read, and
//! absent keys read back as type-appropriate defaults (empty string, -1,
//! -1.0). All mutation happens between `acquire()` and `release()` on the
//! shared advisory lock.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::errors::RigResult;
use crate::domain::models::{JobField, JobResult, JobState};
use crate::infrastructure::fs::lock::{LockSettings, RecordLock};

/// One persisted job record and its lock discipline.
pub struct JobRecord {
    path: PathBuf,
    fields: BTreeMap<JobField, String>,
    dirty: bool,
    lock: RecordLock,
}

impl JobRecord {
    /// Bind to a record file. No I/O happens until [`acquire`].
    ///
    /// [`acquire`]: JobRecord::acquire
    pub fn open(path: impl Into<PathBuf>, lock: &LockSettings) -> Self {
        Self {
            path: path.into(),
            fields: BTreeMap::new(),
            dirty: false,
            lock: RecordLock::new(lock.clone()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record name: the file stem of the backing file.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Take the exclusive lock, then load the field map from the backing
    /// file if it exists, else reset all fields to their defaults.
    pub async fn acquire(&mut self) -> RigResult<()> {
        self.lock.acquire().await?;
        if self.path.exists() {
            let text = std::fs::read_to_string(&self.path)?;
            self.load(&text);
        } else {
            self.reset();
        }
        self.dirty = false;
        Ok(())
    }

    fn load(&mut self, text: &str) {
        self.fields.clear();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            match JobField::from_key(key) {
                Some(field) => {
                    self.fields.insert(field, value.trim().to_string());
                }
                None => tracing::debug!(key, path = %self.path.display(), "dropping unknown key"),
            }
        }
    }

    /// Reset every field to its default (empty).
    pub fn reset(&mut self) {
        self.fields.clear();
        self.dirty = true;
    }

    /// Assign a declared field and mark the record dirty.
    pub fn set(&mut self, field: JobField, value: impl ToString) {
        self.fields.insert(field, value.to_string());
        self.dirty = true;
    }

    /// Assign by wire key. Undeclared keys are rejected: no-op, logged.
    pub fn set_by_name(&mut self, key: &str, value: &str) {
        match JobField::from_key(key) {
            Some(field) => self.set(field, value),
            None => tracing::warn!(key, "assignment to undeclared field rejected"),
        }
    }

    /// Clear a field (it will be omitted from the file).
    pub fn clear(&mut self, field: JobField) {
        if self.fields.remove(&field).is_some() {
            self.dirty = true;
        }
    }

    pub fn get_str(&self, field: JobField) -> &str {
        self.fields.get(&field).map_or("", String::as_str)
    }

    /// Integer accessor; absent or unparseable values read as -1.
    pub fn get_i64(&self, field: JobField) -> i64 {
        self.get_str(field).trim().parse().unwrap_or(-1)
    }

    /// Float accessor; absent or unparseable values read as -1.0.
    pub fn get_f64(&self, field: JobField) -> f64 {
        self.get_str(field).trim().parse().unwrap_or(-1.0)
    }

    pub fn result(&self) -> JobResult {
        JobResult::from_str(self.get_str(JobField::Result))
    }

    pub fn state(&self) -> Option<JobState> {
        JobState::from_str(self.get_str(JobField::State))
    }

    /// Persist if warranted, then unlock unconditionally.
    ///
    /// The write happens only when the lock marker still exists, the
    /// record is dirty, and the backing file still exists. If the file
    /// vanished while locked (moved by a racing writer) the write is
    /// skipped so a relocated record is never resurrected.
    pub async fn release(&mut self) {
        if self.lock.exists() && self.dirty && self.path.exists() {
            match self.write_file() {
                Ok(()) => self.dirty = false,
                Err(e) => {
                    tracing::error!(path = %self.path.display(), error = %e, "record write failed");
                }
            }
        }
        self.lock.release();
    }

    /// Write the record under lock, creating the backing file. Used by
    /// the builder to place fresh records.
    pub async fn create(&mut self) -> RigResult<()> {
        self.lock.acquire().await?;
        let outcome = self.write_file();
        self.lock.release();
        outcome?;
        self.dirty = false;
        Ok(())
    }

    /// Move the backing file into `dest_dir`, under lock, only if both
    /// the source and destination directories currently exist. A record
    /// already moved by a concurrent actor is a silent skip.
    pub async fn relocate(&mut self, dest_dir: &Path) -> RigResult<()> {
        let was_held = self.lock.held();
        if !was_held {
            self.lock.acquire().await?;
        }
        let outcome = self.relocate_locked(dest_dir);
        if !was_held {
            self.lock.release();
        }
        outcome
    }

    fn relocate_locked(&mut self, dest_dir: &Path) -> RigResult<()> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "record already moved, skipping relocate");
            return Ok(());
        }
        if !dest_dir.exists() {
            tracing::debug!(dest = %dest_dir.display(), "relocate target missing, skipping");
            return Ok(());
        }
        let Some(file_name) = self.path.file_name() else {
            return Ok(());
        };
        let dest = dest_dir.join(file_name);
        match std::fs::rename(&self.path, &dest) {
            Ok(()) => {
                self.path = dest;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "record raced away during relocate");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self) -> std::io::Result<()> {
        let mut out = String::new();
        for (field, value) in &self.fields {
            if !value.is_empty() {
                out.push_str(field.key());
                out.push_str(" = ");
                out.push_str(value);
                out.push('\n');
            }
        }
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()
    }
}

/// Read the RESULT of an archived record without taking the lock.
/// Archived records are immutable, so the lockless read is safe; this is
/// what the run-once archive walk uses.
pub fn peek_result(path: &Path) -> JobResult {
    let Ok(text) = std::fs::read_to_string(path) else {
        return JobResult::Unset;
    };
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == JobField::Result.key() {
                return JobResult::from_str(value.trim());
            }
        }
    }
    JobResult::Unset
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rig(dir: &TempDir) -> LockSettings {
        LockSettings {
            path: dir.path().join("records.lock"),
            timeout: std::time::Duration::from_secs(2),
            retry: std::time::Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let dir = TempDir::new().unwrap();
        let lock = rig(&dir);
        let path = dir.path().join("a.job");

        let mut rec = JobRecord::open(&path, &lock);
        rec.set(JobField::Application, "coresim");
        rec.set(JobField::Cores, 4);
        rec.create().await.unwrap();

        let mut other = JobRecord::open(&path, &lock);
        other.acquire().await.unwrap();
        assert_eq!(other.get_str(JobField::Application), "coresim");
        assert_eq!(other.get_i64(JobField::Cores), 4);
        other.release().await;
    }

    #[tokio::test]
    async fn test_absent_fields_read_as_sentinels() {
        let dir = TempDir::new().unwrap();
        let mut rec = JobRecord::open(dir.path().join("a.job"), &rig(&dir));
        rec.acquire().await.unwrap();
        assert_eq!(rec.get_str(JobField::Command), "");
        assert_eq!(rec.get_i64(JobField::Attempts), -1);
        assert!((rec.get_f64(JobField::WallSecs) + 1.0).abs() < f64::EPSILON);
        assert_eq!(rec.result(), JobResult::Unset);
        rec.release().await;
    }

    #[tokio::test]
    async fn test_unknown_keys_dropped_and_empty_omitted() {
        let dir = TempDir::new().unwrap();
        let lock = rig(&dir);
        let path = dir.path().join("a.job");
        std::fs::write(&path, "APPLICATION = coresim\nBOGUS_KEY = 1\nCORES = 2\n").unwrap();

        let mut rec = JobRecord::open(&path, &lock);
        rec.acquire().await.unwrap();
        assert_eq!(rec.get_str(JobField::Application), "coresim");
        rec.set(JobField::Command, ""); // empty: must be omitted on write
        rec.set(JobField::Cores, 8);
        rec.release().await;

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("BOGUS_KEY"));
        assert!(!text.contains("COMMAND"));
        assert!(text.contains("CORES = 8"));
    }

    #[tokio::test]
    async fn test_acquire_release_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let lock = rig(&dir);
        let path = dir.path().join("a.job");

        let mut rec = JobRecord::open(&path, &lock);
        rec.set(JobField::Application, "coresim");
        rec.set(JobField::Resource, "clusterA");
        rec.create().await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut again = JobRecord::open(&path, &lock);
        again.acquire().await.unwrap();
        again.release().await;

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_vanished_file_is_not_resurrected() {
        let dir = TempDir::new().unwrap();
        let lock = rig(&dir);
        let path = dir.path().join("a.job");

        let mut rec = JobRecord::open(&path, &lock);
        rec.set(JobField::Application, "coresim");
        rec.create().await.unwrap();

        rec.acquire().await.unwrap();
        rec.set(JobField::Cores, 16);
        std::fs::remove_file(&path).unwrap(); // racing writer moved it
        rec.release().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_relocate_requires_both_directories() {
        let dir = TempDir::new().unwrap();
        let lock = rig(&dir);
        let src_dir = dir.path().join("pending");
        let dest_dir = dir.path().join("inprogress");
        std::fs::create_dir_all(&src_dir).unwrap();

        let path = src_dir.join("a.job");
        let mut rec = JobRecord::open(&path, &lock);
        rec.set(JobField::Application, "coresim");
        rec.create().await.unwrap();

        // Destination missing: silent skip.
        rec.relocate(&dest_dir).await.unwrap();
        assert!(path.exists());

        std::fs::create_dir_all(&dest_dir).unwrap();
        rec.relocate(&dest_dir).await.unwrap();
        assert!(!path.exists());
        assert!(dest_dir.join("a.job").exists());
        assert_eq!(rec.path(), dest_dir.join("a.job"));
    }

    #[tokio::test]
    async fn test_set_by_name_rejects_undeclared() {
        let dir = TempDir::new().unwrap();
        let mut rec = JobRecord::open(dir.path().join("a.job"), &rig(&dir));
        rec.set_by_name("APPLICATION", "coresim");
        rec.set_by_name("NOT_A_FIELD", "x");
        assert_eq!(rec.get_str(JobField::Application), "coresim");
    }

    #[tokio::test]
    async fn test_peek_result() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.job");
        std::fs::write(&path, "APPLICATION = x\nRESULT = SUCCESS\n").unwrap();
        assert_eq!(peek_result(&path), JobResult::Success);
        assert_eq!(peek_result(&dir.path().join("missing.job")), JobResult::Unset);
    }
}
