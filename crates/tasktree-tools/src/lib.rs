//! tasktree task library
//!
//! Standard task kinds for tasktree playbooks: `shell`, `template`,
//! `set_fact` and `include`.

pub mod tools;

pub use tools::{
    create_default_registry, IncludeTask, SetFactTask, ShellTask, TemplateTask,
};
