//! Job record domain model.
//!
//! A job record is one persisted `KEY = VALUE` file describing a single
//! simulation run: its identity, resource assignment, execution linkage,
//! lifecycle bookkeeping, and derived metrics. The declared field set is
//! fixed; assignments outside it are rejected at the persistence layer.

/// Declared field keys of a job record.
///
/// Variant order is the serialization order, so record files always come
/// out with the same stable line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobField {
    /// Application-suite adapter that owns this record.
    Adapter,
    /// Extra arguments appended to the simulation command.
    AppArgs,
    /// Simulation-reported elapsed time, from the log scanner.
    AppDurationSecs,
    /// Application (job class) name.
    Application,
    /// Application release under test.
    AppVersion,
    /// Attempts performed so far.
    Attempts,
    /// Shell command executed by the wrapper.
    Command,
    /// Processor count assigned to this job.
    Cores,
    /// Record creation timestamp.
    CreatedAt,
    /// Scratch directory footprint after the attempt, in KB.
    DirSizeKb,
    /// Raw exit status of the external command.
    ExitCode,
    /// Coordination root this record belongs to.
    Home,
    /// Host that executed the last attempt.
    Hostname,
    /// Directory copied into the scratch area before each attempt.
    InputDir,
    /// Materialized project instance name.
    Instance,
    /// Solver iterations counted in the log.
    Iterations,
    /// Queue job id discovered in the log, if any.
    JobId,
    /// Log file name (relocated to its archived path on finalize).
    LogFile,
    /// Time loops counted in the log.
    Loops,
    /// Retry ceiling.
    MaxAttempts,
    /// Memory required, in MB.
    MemoryMb,
    /// Compute nodes reported in the log.
    Nodes,
    /// Kernel release of the executing host.
    OsRelease,
    /// Destination for successful output (precondition data).
    OutputDir,
    /// Output footprint reported in the log, in KB.
    OutputSizeKb,
    /// Varied parameter id.
    ParamId,
    /// Varied parameter value.
    ParamValue,
    /// Space-separated upstream applications gating admission.
    Precondition,
    /// Resource (compute pool) this job targets.
    Resource,
    /// Final outcome: SUCCESS or FAILURE.
    Result,
    /// Per-run results archive directory.
    ResultsDir,
    /// Last attempt start timestamp.
    StartedAt,
    /// Explicit lifecycle state backing the directory location.
    State,
    /// Last attempt stop timestamp.
    StoppedAt,
    /// Project template the instance was materialized from.
    Template,
    /// Test campaign name.
    Test,
    /// Log scanner verdict for the last attempt.
    VerifyCode,
    /// Wall-clock duration of the last attempt, in seconds.
    WallSecs,
    /// Private scratch directory for this record.
    WorkDir,
}

impl JobField {
    /// Every declared field, in serialization order.
    pub const ALL: &'static [JobField] = &[
        Self::Adapter,
        Self::AppArgs,
        Self::AppDurationSecs,
        Self::Application,
        Self::AppVersion,
        Self::Attempts,
        Self::Command,
        Self::Cores,
        Self::CreatedAt,
        Self::DirSizeKb,
        Self::ExitCode,
        Self::Home,
        Self::Hostname,
        Self::InputDir,
        Self::Instance,
        Self::Iterations,
        Self::JobId,
        Self::LogFile,
        Self::Loops,
        Self::MaxAttempts,
        Self::MemoryMb,
        Self::Nodes,
        Self::OsRelease,
        Self::OutputDir,
        Self::OutputSizeKb,
        Self::ParamId,
        Self::ParamValue,
        Self::Precondition,
        Self::Resource,
        Self::Result,
        Self::ResultsDir,
        Self::StartedAt,
        Self::State,
        Self::StoppedAt,
        Self::Template,
        Self::Test,
        Self::VerifyCode,
        Self::WallSecs,
        Self::WorkDir,
    ];

    /// Wire key used in the record file.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Adapter => "ADAPTER",
            Self::AppArgs => "APP_ARGS",
            Self::AppDurationSecs => "APP_DURATION_SECS",
            Self::Application => "APPLICATION",
            Self::AppVersion => "APP_VERSION",
            Self::Attempts => "ATTEMPTS",
            Self::Command => "COMMAND",
            Self::Cores => "CORES",
            Self::CreatedAt => "CREATED_AT",
            Self::DirSizeKb => "DIR_SIZE_KB",
            Self::ExitCode => "EXIT_CODE",
            Self::Home => "HOME",
            Self::Hostname => "HOSTNAME",
            Self::InputDir => "INPUT_DIR",
            Self::Instance => "INSTANCE",
            Self::Iterations => "ITERATIONS",
            Self::JobId => "JOB_ID",
            Self::LogFile => "LOG_FILE",
            Self::Loops => "LOOPS",
            Self::MaxAttempts => "MAX_ATTEMPTS",
            Self::MemoryMb => "MEMORY_MB",
            Self::Nodes => "NODES",
            Self::OsRelease => "OS_RELEASE",
            Self::OutputDir => "OUTPUT_DIR",
            Self::OutputSizeKb => "OUTPUT_SIZE_KB",
            Self::ParamId => "PARAM_ID",
            Self::ParamValue => "PARAM_VALUE",
            Self::Precondition => "PRECONDITION",
            Self::Resource => "RESOURCE",
            Self::Result => "RESULT",
            Self::ResultsDir => "RESULTS_DIR",
            Self::StartedAt => "STARTED_AT",
            Self::State => "STATE",
            Self::StoppedAt => "STOPPED_AT",
            Self::Template => "TEMPLATE",
            Self::Test => "TEST",
            Self::VerifyCode => "VERIFY_CODE",
            Self::WallSecs => "WALL_SECS",
            Self::WorkDir => "WORK_DIR",
        }
    }

    /// Resolve a wire key back to its declared field, if any.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

/// Explicit lifecycle state, backing the record's directory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    /// Waiting in the pending area for admission.
    #[default]
    Pending,
    /// Admitted; owned by a worker in the in-progress area.
    InProgress,
    /// Finalized into the results archive.
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Outcome of a job. Unset until an attempt completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobResult {
    /// No attempt has completed yet. Serializes as empty and is therefore
    /// omitted from the record file.
    #[default]
    Unset,
    Success,
    Failure,
}

impl JobResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            _ => Self::Unset,
        }
    }

    /// Whether this is a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

/// Canonical record name for (instance, application, cores, repeat).
///
/// This name is the sole de-duplication key between builder runs.
pub fn record_name(instance: &str, application: &str, cores: u32, repeat: u32) -> String {
    format!("{instance}_{application}_{cores}_{repeat}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        for field in JobField::ALL {
            assert_eq!(JobField::from_key(field.key()), Some(*field));
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert_eq!(JobField::from_key("NO_SUCH_KEY"), None);
        assert_eq!(JobField::from_key("result"), None); // keys are exact
    }

    #[test]
    fn test_result_parsing() {
        assert_eq!(JobResult::from_str("SUCCESS"), JobResult::Success);
        assert_eq!(JobResult::from_str("FAILURE"), JobResult::Failure);
        assert_eq!(JobResult::from_str(""), JobResult::Unset);
        assert_eq!(JobResult::from_str("garbage"), JobResult::Unset);
        assert!(!JobResult::Unset.is_terminal());
        assert!(JobResult::Failure.is_terminal());
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [JobState::Pending, JobState::InProgress, JobState::Completed] {
            assert_eq!(JobState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(JobState::from_str("unknown"), None);
    }

    #[test]
    fn test_record_name() {
        assert_eq!(record_name("projA_none_none", "coresim", 4, 2), "projA_none_none_coresim_4_2");
    }
}
