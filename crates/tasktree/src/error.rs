//! Error types for parsing, registration, resolution and execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a document into an element tree.
///
/// Parsing is all-or-nothing: the first structural problem aborts the
/// whole file and no partial tree is returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The playbook file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A node has the wrong shape (e.g. a scalar where a mapping is expected).
    #[error("{path}: expected {expected}, found {found}")]
    UnexpectedNode {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A key is neither a control field nor a registered task kind.
    #[error("{path}: unknown field '{field}'")]
    UnknownField { path: String, field: String },

    /// A second task-kind key on the same element.
    #[error("{path}: task is already configured as '{existing}', cannot add '{task}'")]
    DuplicateTask {
        path: String,
        existing: String,
        task: String,
    },

    /// A field value could not be decoded.
    #[error("{path}: invalid value for '{field}': {reason}")]
    InvalidField {
        path: String,
        field: String,
        reason: String,
    },

    /// The element violates a structural rule (block/task exclusion, loop shape, ...).
    #[error("{path}: {reason}")]
    InvalidElement { path: String, reason: String },
}

/// Errors raised while populating the task registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Two task kinds claim the same name.
    #[error("Task {0} is already registered")]
    Duplicate(String),

    /// A task kind claims the name of a control field.
    #[error("Task name '{0}' collides with a control field")]
    ReservedName(String),
}

/// A template failed to resolve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Template error in '{template}': {message}")]
pub struct ResolveError {
    pub template: String,
    pub message: String,
}

impl ResolveError {
    pub fn new(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by task instantiation, initialization or execution.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task kind not found in the registry.
    #[error("Task not registered: {0}")]
    NotRegistered(String),

    /// The element carries no task invocation.
    #[error("Element has no task")]
    Missing,

    /// `init` rejected the configuration.
    #[error("Init failed for task {task}: {source}")]
    Init {
        task: String,
        #[source]
        source: Box<TaskError>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Task execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Process spawn error.
    #[error("Process error: {0}")]
    Process(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The run was cancelled before the task started its effect.
    #[error("Cancelled")]
    Cancelled,

    /// An included file failed.
    #[error("Include of {file} failed: {source}")]
    Include {
        file: String,
        #[source]
        source: Box<ExecutionError>,
    },
}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        TaskError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Json(e.to_string())
    }
}

impl From<ResolveError> for TaskError {
    fn from(e: ResolveError) -> Self {
        TaskError::Template(e.to_string())
    }
}

/// Errors that abort a playbook run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A task failed and its element did not set `ignore_errors`.
    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },

    /// A loop `var` did not resolve to a JSON array.
    #[error("Loop variable did not resolve to a JSON array ({rendered}): {reason}")]
    LoopNotArray { rendered: String, reason: String },

    /// File inclusion nested deeper than the configured limit.
    #[error("Include depth limit of {0} exceeded")]
    IncludeDepth(usize),
}

impl ExecutionError {
    pub(crate) fn task(task: impl Into<String>, source: TaskError) -> Self {
        ExecutionError::Task {
            task: task.into(),
            source,
        }
    }
}
