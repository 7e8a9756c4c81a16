//! Advisory exclusive locking for record files.
//!
//! All record read-modify-write sequences serialize on one lock file with
//! a fixed path, created on first use. Acquisition is bounded: the lock is
//! taken with non-blocking `flock` attempts on a backoff schedule, and a
//! holder that outlives the bound surfaces as an error naming the PID
//! recorded in the lock file. Locks are advisory only; the kernel drops
//! them when the holder exits, so a crashed holder cannot wedge the rig.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::domain::errors::{RigError, RigResult};
use crate::domain::models::LockConfig;
use crate::infrastructure::fs::Workspace;

/// Lock key and acquisition bounds, derived once from configuration.
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Lock file path (the fixed key).
    pub path: PathBuf,
    /// Give up acquiring after this long.
    pub timeout: Duration,
    /// Initial interval between acquisition attempts.
    pub retry: Duration,
}

impl LockSettings {
    /// Settings with the default bounds for a given key path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_secs(300),
            retry: Duration::from_millis(250),
        }
    }

    /// Derive settings from configuration, falling back to the
    /// workspace's fixed key.
    pub fn from_config(lock: &LockConfig, ws: &Workspace) -> Self {
        let path = lock
            .path
            .as_ref()
            .map_or_else(|| ws.default_lock_path(), PathBuf::from);
        Self {
            path,
            timeout: Duration::from_secs(lock.timeout_secs),
            retry: Duration::from_millis(lock.retry_ms.max(1)),
        }
    }
}

/// One acquirable handle on the record lock.
pub struct RecordLock {
    settings: LockSettings,
    guard: Option<Flock<File>>,
}

impl RecordLock {
    pub fn new(settings: LockSettings) -> Self {
        Self {
            settings,
            guard: None,
        }
    }

    /// Whether this handle currently holds the lock.
    pub fn held(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether the lock marker file exists.
    pub fn exists(&self) -> bool {
        self.settings.path.exists()
    }

    /// Acquire the exclusive lock, waiting up to the configured bound.
    /// Re-acquiring while already held is a no-op.
    pub async fn acquire(&mut self) -> RigResult<()> {
        if self.guard.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.settings.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path = self.settings.path.clone();
        let attempt = || {
            let path = path.clone();
            async move {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)
                    .map_err(|e| backoff::Error::permanent(RigError::from(e)))?;
                match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                    Ok(guard) => Ok(guard),
                    Err((_, errno)) if errno == Errno::EWOULDBLOCK || errno == Errno::EINTR => {
                        Err(backoff::Error::transient(RigError::LockBusy {
                            path: path.clone(),
                        }))
                    }
                    Err((_, errno)) => Err(backoff::Error::permanent(RigError::Io(
                        std::io::Error::from_raw_os_error(errno as i32),
                    ))),
                }
            }
        };

        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.retry)
            .with_max_interval(self.settings.retry.saturating_mul(8))
            .with_max_elapsed_time(Some(self.settings.timeout))
            .build();

        match backoff::future::retry(schedule, attempt).await {
            Ok(mut guard) => {
                // Record ourselves as holder for diagnostics.
                let _ = guard.set_len(0);
                let _ = guard.write_all(format!("{}\n", std::process::id()).as_bytes());
                let _ = guard.flush();
                self.guard = Some(guard);
                Ok(())
            }
            Err(RigError::LockBusy { .. }) => Err(self.timeout_error()),
            Err(other) => Err(other),
        }
    }

    /// Drop the lock. Releasing without holding is a no-op.
    pub fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            let _ = guard.unlock();
        }
    }

    /// PID recorded by the last holder, if readable.
    pub fn holder_pid(&self) -> Option<i32> {
        std::fs::read_to_string(&self.settings.path)
            .ok()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    fn timeout_error(&self) -> RigError {
        let holder_pid = self.holder_pid();
        let holder_alive =
            holder_pid.is_some_and(|pid| kill(Pid::from_raw(pid), None).is_ok());
        RigError::LockTimeout {
            path: self.settings.path.clone(),
            timeout_secs: self.settings.timeout.as_secs(),
            holder_pid,
            holder_alive,
        }
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        self.release();
    }
}
