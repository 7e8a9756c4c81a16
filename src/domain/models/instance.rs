//! Project instance model.

use std::path::{Path, PathBuf};

/// A materialized, parameter-specific copy of a project template,
/// consumed as job input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Template this instance was copied from.
    pub template: String,
    /// Varied parameter id (`none` when nothing is varied).
    pub param_id: String,
    /// Varied parameter value (`none` when nothing is varied).
    pub param_value: String,
    /// Canonical instance name: `{template}_{id}_{value}`.
    pub name: String,
    /// Directory under the instances area.
    pub dir: PathBuf,
}

impl Instance {
    /// Derive the instance for (template, id, value). When either side of
    /// the parameter selection is `none`, both collapse to `none`.
    pub fn new(template: &str, param_id: &str, param_value: &str, instances_root: &Path) -> Self {
        let (id, value) = if param_id == "none" || param_value == "none" {
            ("none", "none")
        } else {
            (param_id, param_value)
        };
        let name = format!("{template}_{id}_{value}");
        let dir = instances_root.join(&name);
        Self {
            template: template.to_string(),
            param_id: id.to_string(),
            param_value: value.to_string(),
            name,
            dir,
        }
    }

    /// Whether this instance varies a parameter at all.
    pub fn is_parametrized(&self) -> bool {
        self.param_value != "none"
    }
}
