//! Element execution: guards, loops, blocks and task dispatch.
//!
//! Execution is depth-first and strictly sequential. The first error that is
//! not swallowed by `ignore_errors` unwinds to the caller.

use std::sync::Arc;

use crate::element::{Element, ElementId, ElementTree, Environment, LoopSpec};
use crate::error::{ExecutionError, TaskError};
use crate::executor::PlaybookExecutor;
use crate::facts::{Facts, LOOP_ITEM};
use crate::registry::{TaskElement, TaskRegistry};
use crate::resolve::{resolve, resolve_environment, Resolution};
use crate::template::TemplateResolver;

/// Runs the elements of one parsed tree against an executor's scope.
pub struct Engine<'a> {
    tree: &'a ElementTree,
    registry: Arc<TaskRegistry>,
    resolver: Arc<dyn TemplateResolver>,
}

impl<'a> Engine<'a> {
    pub fn new(
        tree: &'a ElementTree,
        registry: Arc<TaskRegistry>,
        resolver: Arc<dyn TemplateResolver>,
    ) -> Self {
        Self {
            tree,
            registry,
            resolver,
        }
    }

    /// Execute one element and, for blocks, its descendants.
    pub fn execute(
        &self,
        id: ElementId,
        executor: &mut PlaybookExecutor,
    ) -> Result<(), ExecutionError> {
        let element = &self.tree[id];
        let span = tracing::info_span!("element", name = %element.display_name());
        let _enter = span.enter();

        if !self.should_execute(element, executor.facts()) {
            tracing::debug!("Skipping element, condition not met");
            return Ok(());
        }

        match &element.loop_spec {
            Some(spec) => self.execute_loop(id, spec, executor),
            None => self.execute_once(id, executor),
        }
    }

    /// Evaluate the guards. A guard that fails to resolve counts as false.
    fn should_execute(&self, element: &Element, facts: &Facts) -> bool {
        for condition in &element.when {
            match resolve(condition, self.resolver.as_ref(), facts) {
                Ok(result) if result == "false" => return false,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Condition failed to resolve, skipping element");
                    return false;
                }
            }
        }
        true
    }

    fn execute_loop(
        &self,
        id: ElementId,
        spec: &LoopSpec,
        executor: &mut PlaybookExecutor,
    ) -> Result<(), ExecutionError> {
        let items = self.resolve_loop(spec, executor.facts())?;
        tracing::debug!(items = items.len(), "Starting loop");

        for item in items {
            executor.facts_mut().set(LOOP_ITEM, item);
            let result = self.execute_once(id, executor);
            executor.facts_mut().remove(LOOP_ITEM);
            result?;
        }
        Ok(())
    }

    fn resolve_loop(
        &self,
        spec: &LoopSpec,
        facts: &Facts,
    ) -> Result<Vec<serde_json::Value>, ExecutionError> {
        match resolve(spec, self.resolver.as_ref(), facts)? {
            LoopSpec::Items(items) => Ok(items),
            LoopSpec::Var(rendered) => {
                match serde_json::from_str::<Vec<serde_json::Value>>(&rendered) {
                    Ok(items) => Ok(items),
                    Err(e) => Err(ExecutionError::LoopNotArray {
                        rendered,
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    fn execute_once(
        &self,
        id: ElementId,
        executor: &mut PlaybookExecutor,
    ) -> Result<(), ExecutionError> {
        let (element, environment) = {
            let mut cx = Resolution::new(self.resolver.as_ref(), executor.facts());
            let element = cx.resolve(&self.tree[id])?;
            let environment = if element.is_block() {
                Environment::new()
            } else {
                resolve_environment(self.tree, id, element.environment.clone(), &mut cx)?
            };
            (element, environment)
        };

        if element.is_block() {
            for child in &element.block {
                self.execute(*child, executor)?;
            }
            return Ok(());
        }

        self.execute_task(&element, &environment, executor)
    }

    fn execute_task(
        &self,
        element: &Element,
        environment: &Environment,
        executor: &mut PlaybookExecutor,
    ) -> Result<(), ExecutionError> {
        let invocation = element
            .task
            .as_ref()
            .ok_or_else(|| ExecutionError::task(element.display_name(), TaskError::Missing))?;
        let name = invocation.name.as_str();

        let mut task = self
            .registry
            .instantiate(name)
            .map_err(|e| ExecutionError::task(name, e))?;

        tracing::info!(task = name, "Running task {}", element.display_name());

        let view = TaskElement::new(element, environment);
        task.init(&view).map_err(|source| {
            ExecutionError::task(
                name,
                TaskError::Init {
                    task: name.to_string(),
                    source: Box::new(source),
                },
            )
        })?;

        let output = match task.run(executor) {
            Ok(output) => output,
            Err(e) if element.ignore_errors => {
                tracing::warn!(task = name, error = %e, "Task failed, ignoring error");
                None
            }
            Err(e) => return Err(ExecutionError::task(name, e)),
        };

        if let (Some(register), Some(output)) = (&element.register, output) {
            tracing::debug!(task = name, register = %register, "Registering task output");
            executor.facts_mut().set(register.clone(), output);
        }
        Ok(())
    }
}
