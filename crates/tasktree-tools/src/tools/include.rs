//! File inclusion task.

use serde::Deserialize;
use std::path::PathBuf;

use tasktree::{Executor, Task, TaskElement, TaskError};

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeConfig {
    /// Files to execute, in order.
    pub files: Vec<PathBuf>,
}

/// Executes other playbook files against the same facts.
#[derive(Debug, Default)]
pub struct IncludeTask {
    files: Vec<PathBuf>,
}

impl Task for IncludeTask {
    fn name(&self) -> &'static str {
        "include"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.files = element.read_config::<IncludeConfig>()?.files;
        Ok(())
    }

    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
        for file in &self.files {
            executor
                .execute_file(file)
                .map_err(|e| TaskError::Include {
                    file: file.display().to_string(),
                    source: Box::new(e),
                })?;
        }
        Ok(None)
    }
}
