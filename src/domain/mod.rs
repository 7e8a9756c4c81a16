//! Domain layer: job record model, resource limits, configuration, ports.

pub mod errors;
pub mod models;
pub mod ports;
