//! The shared variable scope ("facts") of a playbook run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::element::TaskConfig;

/// Name under which loop iterations bind the current item.
pub const LOOP_ITEM: &str = "item";

/// Key-value store read and written throughout a run.
///
/// One instance lives for a whole run and is shared by every element,
/// every loop iteration and every included file:
/// - `register` stores task outputs here
/// - `set_fact` merges new pairs here (last write wins)
/// - loops bind [`LOOP_ITEM`] for the duration of one iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facts {
    variables: HashMap<String, serde_json::Value>,
}

impl Facts {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value, returning the previous one.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.variables.insert(name.into(), value)
    }

    /// Get a variable value.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name)
    }

    /// Remove a variable.
    pub fn remove(&mut self, name: &str) -> Option<serde_json::Value> {
        self.variables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Merge a task configuration mapping into the scope.
    pub fn merge(&mut self, config: &TaskConfig) {
        for (k, v) in config {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.variables.iter()
    }
}

impl From<HashMap<String, serde_json::Value>> for Facts {
    fn from(variables: HashMap<String, serde_json::Value>) -> Self {
        Self { variables }
    }
}

impl FromIterator<(String, serde_json::Value)> for Facts {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            variables: iter.into_iter().collect(),
        }
    }
}
