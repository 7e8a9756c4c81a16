//! Infrastructure layer: persistence, locking, config loading, logging,
//! system probes.

pub mod config;
pub mod fs;
pub mod limits;
pub mod logging;
