//! Task capability contract and the task registry.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

use crate::element::{Element, Environment, TaskConfig, TaskInvocation};
use crate::error::{ExecutionError, RegistrationError, TaskError};
use crate::facts::Facts;
use crate::parser::ControlField;
use crate::template::TemplateResolver;

/// Facade of the running playbook handed to tasks.
pub trait Executor {
    /// Parse and execute another file against the same scope.
    fn execute_file(&mut self, path: &Path) -> Result<(), ExecutionError>;

    /// Merge key/value pairs into the scope (last write wins).
    fn apply_config(&mut self, config: &TaskConfig);

    /// Read-only view of the scope at call time.
    fn current_config(&self) -> &Facts;

    /// Template resolver of this run.
    fn resolver(&self) -> &dyn TemplateResolver;

    /// Whether the caller asked the run to stop.
    fn is_cancelled(&self) -> bool;
}

/// A pluggable unit of effect.
///
/// A fresh instance is constructed for every execution; `init` receives the
/// resolved element and `run` performs the effect.
pub trait Task {
    /// Registry key and document field this task answers to.
    fn name(&self) -> &'static str;

    /// Extract and validate this task's configuration.
    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError>;

    /// Perform the effect. `Ok(None)` means no output.
    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError>;
}

/// Zero-argument constructor of a task instance.
pub type TaskConstructor = fn() -> Box<dyn Task>;

fn construct<T: Task + Default + 'static>() -> Box<dyn Task> {
    Box::new(T::default())
}

/// Resolved element as seen by [`Task::init`].
#[derive(Debug, Clone, Copy)]
pub struct TaskElement<'a> {
    element: &'a Element,
    environment: &'a Environment,
}

impl<'a> TaskElement<'a> {
    pub fn new(element: &'a Element, environment: &'a Environment) -> Self {
        Self {
            element,
            environment,
        }
    }

    /// Environment merged from all ancestors, nearest definition wins.
    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    pub fn invocation(&self) -> Result<&'a TaskInvocation, TaskError> {
        self.element.task.as_ref().ok_or(TaskError::Missing)
    }

    /// The task's opaque configuration mapping.
    pub fn config(&self) -> Result<&'a TaskConfig, TaskError> {
        Ok(self.invocation()?.config.as_ref())
    }

    /// Decode the configuration mapping into a typed struct.
    pub fn read_config<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        let invocation = self.invocation()?;
        let value = serde_json::Value::Object(invocation.config.as_ref().clone());
        serde_json::from_value(value).map_err(|e| {
            TaskError::Configuration(format!("Invalid {} config: {}", invocation.name, e))
        })
    }
}

/// Registry of available task kinds.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<&'static str, TaskConstructor>,
}

impl TaskRegistry {
    /// Create a new empty task registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task kind under the name its instances report.
    pub fn register<T: Task + Default + 'static>(&mut self) -> Result<(), RegistrationError> {
        self.register_constructor(construct::<T>)
    }

    /// Register a task kind from an explicit constructor.
    pub fn register_constructor(
        &mut self,
        constructor: TaskConstructor,
    ) -> Result<(), RegistrationError> {
        let name = constructor().name();
        if ControlField::from_key(name).is_some() {
            return Err(RegistrationError::ReservedName(name.to_string()));
        }
        if self.tasks.contains_key(name) {
            return Err(RegistrationError::Duplicate(name.to_string()));
        }
        tracing::debug!(task = name, "Registered task kind");
        self.tasks.insert(name, constructor);
        Ok(())
    }

    /// Build a registry from an explicit list of constructors.
    pub fn with_tasks(
        constructors: impl IntoIterator<Item = TaskConstructor>,
    ) -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        for constructor in constructors {
            registry.register_constructor(constructor)?;
        }
        Ok(registry)
    }

    /// Check if a task kind is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All registered task names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tasks.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Construct a fresh instance of a task kind.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Task>, TaskError> {
        let constructor = self
            .tasks
            .get(name)
            .ok_or_else(|| TaskError::NotRegistered(name.to_string()))?;
        Ok(constructor())
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Default)]
    struct MockTask;

    impl Task for MockTask {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn init(&mut self, _element: &TaskElement<'_>) -> Result<(), TaskError> {
            Ok(())
        }

        fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
            Ok(Some(json!({"mock": true})))
        }
    }

    #[derive(Default)]
    struct OtherMock;

    impl Task for OtherMock {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn init(&mut self, _element: &TaskElement<'_>) -> Result<(), TaskError> {
            Ok(())
        }

        fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct Impostor;

    impl Task for Impostor {
        fn name(&self) -> &'static str {
            "register"
        }

        fn init(&mut self, _element: &TaskElement<'_>) -> Result<(), TaskError> {
            Ok(())
        }

        fn run(&mut self, _executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
            Ok(None)
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = TaskRegistry::new();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_registry_register() {
        let mut registry = TaskRegistry::new();
        registry.register::<MockTask>().unwrap();

        assert!(registry.has("mock"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.names(), vec!["mock"]);
    }

    #[test]
    fn test_registry_rejects_duplicate_name() {
        let mut registry = TaskRegistry::new();
        registry.register::<MockTask>().unwrap();

        let err = registry.register::<OtherMock>().unwrap_err();
        assert_eq!(err, RegistrationError::Duplicate("mock".to_string()));
    }

    #[test]
    fn test_with_tasks_fails_on_duplicate() {
        let result = TaskRegistry::with_tasks([
            construct::<MockTask> as TaskConstructor,
            construct::<OtherMock>,
        ]);
        assert!(matches!(result, Err(RegistrationError::Duplicate(_))));
    }

    #[test]
    fn test_registry_rejects_control_field_name() {
        let mut registry = TaskRegistry::new();
        let err = registry.register::<Impostor>().unwrap_err();
        assert_eq!(err, RegistrationError::ReservedName("register".to_string()));
    }

    #[test]
    fn test_registry_instantiate() {
        let mut registry = TaskRegistry::new();
        registry.register::<MockTask>().unwrap();

        let task = registry.instantiate("mock").unwrap();
        assert_eq!(task.name(), "mock");

        let err = registry.instantiate("unknown").err().unwrap();
        assert!(matches!(err, TaskError::NotRegistered(_)));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct CopyConfig {
        src: String,
        #[serde(default)]
        force: bool,
    }

    #[test]
    fn test_read_config() {
        let mut config = TaskConfig::new();
        config.insert("src".to_string(), json!("a.txt"));
        let element = Element {
            task: Some(TaskInvocation::new("copy", config)),
            ..Element::default()
        };
        let env = Environment::new();
        let view = TaskElement::new(&element, &env);

        let parsed: CopyConfig = view.read_config().unwrap();
        assert_eq!(
            parsed,
            CopyConfig {
                src: "a.txt".to_string(),
                force: false
            }
        );
    }

    #[test]
    fn test_read_config_reports_task_name() {
        let element = Element {
            task: Some(TaskInvocation::new("copy", TaskConfig::new())),
            ..Element::default()
        };
        let env = Environment::new();
        let view = TaskElement::new(&element, &env);

        let err = view.read_config::<CopyConfig>().unwrap_err();
        assert!(err.to_string().contains("Invalid copy config"));
    }
}
