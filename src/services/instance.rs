//! Project instance materialization.
//!
//! An instance is a parameter-specific copy of a project template. The
//! core copies the template tree; the adapter applies the parameter
//! selection. A failed instantiation deletes the partial copy so the
//! (template, value) branch is cleanly abandoned.

use std::sync::Arc;

use crate::domain::errors::RigResult;
use crate::domain::models::Instance;
use crate::domain::ports::SuiteAdapter;
use crate::infrastructure::fs::{copy_tree, Workspace};

pub struct Materializer {
    ws: Workspace,
    adapter: Arc<dyn SuiteAdapter>,
}

impl Materializer {
    pub fn new(ws: Workspace, adapter: Arc<dyn SuiteAdapter>) -> Self {
        Self { ws, adapter }
    }

    /// Materialize (or reuse) the instance. Returns `false` when the
    /// branch must be abandoned.
    pub async fn materialize(&self, instance: &Instance) -> RigResult<bool> {
        if instance.dir.exists() {
            tracing::debug!(instance = %instance.name, "instance already materialized, reusing");
            return Ok(true);
        }

        let template_dir = self.ws.templates().join(&instance.template);
        if !template_dir.exists() {
            tracing::warn!(
                template = %instance.template,
                path = %template_dir.display(),
                "template missing, abandoning branch"
            );
            return Ok(false);
        }

        copy_tree(&template_dir, &instance.dir)?;

        if instance.is_parametrized() && !self.adapter.materialize_instance(instance).await {
            std::fs::remove_dir_all(&instance.dir)?;
            tracing::info!(
                instance = %instance.name,
                "instance instantiation failed, abandoning branch"
            );
            return Ok(false);
        }

        tracing::info!(instance = %instance.name, "instance created");
        Ok(true)
    }
}
