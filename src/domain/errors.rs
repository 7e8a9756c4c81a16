//! Domain errors for the perfrig system.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the job coordination core.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("lock {path} is busy")]
    LockBusy { path: PathBuf },

    #[error(
        "lock {path} not acquired within {timeout_secs}s \
         (last holder pid {holder_pid:?}, alive: {holder_alive})"
    )]
    LockTimeout {
        path: PathBuf,
        timeout_secs: u64,
        holder_pid: Option<i32>,
        holder_alive: bool,
    },

    #[error("input directory missing: {0}")]
    InputMissing(PathBuf),

    #[error("record path {0} is not inside a job area")]
    OrphanRecord(PathBuf),

    #[error("resource descriptor {path} is malformed: {reason}")]
    BadDescriptor { path: PathBuf, reason: String },

    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("failed to spawn worker for {record}: {source}")]
    SpawnFailed {
        record: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RigResult<T> = Result<T, RigError>;
