//! Fact assignment task.

use tasktree::{Executor, Task, TaskConfig, TaskElement, TaskError};

/// Merges its (already resolved) configuration into the shared facts.
#[derive(Debug, Default)]
pub struct SetFactTask {
    config: TaskConfig,
}

impl Task for SetFactTask {
    fn name(&self) -> &'static str {
        "set_fact"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.config = element.config()?.clone();
        Ok(())
    }

    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
        tracing::debug!(keys = ?self.config.keys().collect::<Vec<_>>(), "Setting facts");
        executor.apply_config(&self.config);
        Ok(None)
    }
}
