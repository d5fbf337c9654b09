//! tasktree core
//!
//! Declarative playbook execution.
//!
//! This crate provides:
//! - Element model and YAML document parser
//! - Task registry with a pluggable task capability
//! - Structure-preserving, cycle-safe variable resolution
//! - Execution engine (guards, loops, blocks, error handling) and the
//!   playbook executor owning the shared scope
//!
//! Concrete task kinds live in `tasktree-tools`.

pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod executor;
pub mod facts;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod template;

#[cfg(test)]
mod test_tasks;

pub use config::PlaybookConfig;
pub use element::{Element, ElementId, ElementTree, Environment, LoopSpec, TaskConfig, TaskInvocation};
pub use error::{ExecutionError, ParseError, RegistrationError, ResolveError, TaskError};
pub use executor::{CancellationToken, PlaybookExecutor};
pub use facts::Facts;
pub use parser::{ControlField, Parser};
pub use registry::{Executor, Task, TaskElement, TaskRegistry};
pub use resolve::{resolve, Resolve};
pub use template::{JinjaResolver, TemplateResolver};
