//! Built-in application-suite adapters.
//!
//! An adapter is selected once at process start, by name, from
//! configuration (builder, scheduler) or from the ADAPTER field of the
//! record being executed (worker).

pub mod blank;
pub mod staged;

use std::sync::Arc;

use crate::domain::ports::SuiteAdapter;

pub use blank::BlankAdapter;
pub use staged::StagedAdapter;

/// Resolve an adapter by name. The empty name maps to the default
/// `blank` adapter.
pub fn create(name: &str) -> Option<Arc<dyn SuiteAdapter>> {
    match name {
        "" | "blank" => Some(Arc::new(BlankAdapter::new())),
        "staged" => Some(Arc::new(StagedAdapter::new())),
        _ => None,
    }
}
