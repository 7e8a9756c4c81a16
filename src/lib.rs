//! Perfrig - parallel application performance test rig.
//!
//! Perfrig drives parametrized simulation runs on a shared resource pool,
//! coordinating entirely through the filesystem: job records are plain
//! `KEY = VALUE` files whose directory location encodes lifecycle state,
//! serialized by advisory locks. There is no database and no RPC.
//!
//! # Architecture
//!
//! The crate follows a layered layout:
//!
//! - **Domain Layer** (`domain`): job record model, resource limits, config
//! - **Service Layer** (`services`): graph builder, scheduler, execution
//!   wrapper, log scanner
//! - **Infrastructure Layer** (`infrastructure`): record persistence,
//!   advisory locking, config loading, logging
//! - **Adapters** (`adapters`): built-in application-suite strategies
//!
//! Three binaries share this library: `perfrig-build` expands a test matrix
//! into pending job records, `perfrig-sched` admits them against the
//! resource budget, and `perfrig-worker` executes a single record to
//! completion.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RigError, RigResult};
pub use domain::models::{
    Config, Instance, JobField, JobResult, JobState, LockConfig, LoggingConfig, ResourceLimits,
    SchedulerConfig,
};
pub use domain::ports::SuiteAdapter;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::fs::{JobRecord, LockSettings, Workspace};
pub use services::{ExecutionWrapper, GraphBuilder, LogReport, LogScanner, Scheduler};
