//! Playbook run configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings of one playbook run.
///
/// - `base_dir`: directory relative playbook paths resolve against (default: ".")
/// - `extra_vars`: initial facts, visible to every element
/// - `max_include_depth`: nesting limit for included files (default: 64)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookConfig {
    /// Directory relative playbook paths resolve against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Initial facts
    #[serde(default)]
    pub extra_vars: HashMap<String, serde_json::Value>,

    /// Nesting limit for included files
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_include_depth() -> usize {
    64
}

impl PlaybookConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Add an initial fact.
    pub fn with_var(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_vars.insert(name.into(), value);
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Resolve a playbook path; absolute paths are kept as given.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            extra_vars: HashMap::new(),
            max_include_depth: default_max_include_depth(),
        }
    }
}
