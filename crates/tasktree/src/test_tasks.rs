//! Minimal task kinds for exercising the engine in unit tests.

use serde::Deserialize;
use serde_json::Value;

use crate::element::{Environment, TaskConfig};
use crate::error::TaskError;
use crate::registry::{Executor, Task, TaskElement, TaskRegistry};

/// Merges its configuration into the scope.
#[derive(Default)]
pub struct MergeFacts {
    config: TaskConfig,
}

impl Task for MergeFacts {
    fn name(&self) -> &'static str {
        "merge_facts"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.config = element.config()?.clone();
        Ok(())
    }

    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<Value>, TaskError> {
        executor.apply_config(&self.config);
        Ok(None)
    }
}

#[derive(Deserialize)]
struct EchoConfig {
    msg: Value,
}

/// Returns `msg` as its output.
#[derive(Default)]
pub struct Echo {
    msg: Value,
}

impl Task for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.msg = element.read_config::<EchoConfig>()?.msg;
        Ok(())
    }

    fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<Value>, TaskError> {
        Ok(Some(self.msg.clone()))
    }
}

/// Returns the merged environment it was initialized with.
#[derive(Default)]
pub struct Env {
    environment: Environment,
}

impl Task for Env {
    fn name(&self) -> &'static str {
        "env"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.environment = element.environment().clone();
        Ok(())
    }

    fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<Value>, TaskError> {
        Ok(Some(serde_json::to_value(&self.environment)?))
    }
}

/// Always fails in `run`.
#[derive(Default)]
pub struct Fail;

impl Task for Fail {
    fn name(&self) -> &'static str {
        "fail"
    }

    fn init(&mut self, _element: &TaskElement<'_>) -> Result<(), TaskError> {
        Ok(())
    }

    fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<Value>, TaskError> {
        Err(TaskError::ExecutionFailed("boom".to_string()))
    }
}

/// Always fails in `init`.
#[derive(Default)]
pub struct BadInit;

impl Task for BadInit {
    fn name(&self) -> &'static str {
        "bad_init"
    }

    fn init(&mut self, _element: &TaskElement<'_>) -> Result<(), TaskError> {
        Err(TaskError::Configuration("rejected".to_string()))
    }

    fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<Value>, TaskError> {
        Ok(None)
    }
}

pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register::<MergeFacts>().unwrap();
    registry.register::<Echo>().unwrap();
    registry.register::<Env>().unwrap();
    registry.register::<Fail>().unwrap();
    registry.register::<BadInit>().unwrap();
    registry
}
