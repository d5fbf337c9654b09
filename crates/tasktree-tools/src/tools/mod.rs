//! Standard task kinds.
//!
//! - `shell` - Execute shell commands
//! - `template` - Render a template file to disk
//! - `set_fact` - Merge key/value pairs into the facts
//! - `include` - Execute other playbook files

mod include;
mod set_fact;
mod shell;
mod template;

pub use self::include::{IncludeConfig, IncludeTask};
pub use self::set_fact::SetFactTask;
pub use self::shell::{ShellConfig, ShellTask};
pub use self::template::{TemplateConfig, TemplateTask};

use tasktree::{RegistrationError, TaskRegistry};

/// Create a task registry with all standard task kinds registered.
pub fn create_default_registry() -> Result<TaskRegistry, RegistrationError> {
    let mut registry = TaskRegistry::new();

    registry.register::<ShellTask>()?;
    registry.register::<TemplateTask>()?;
    registry.register::<SetFactTask>()?;
    registry.register::<IncludeTask>()?;

    Ok(registry)
}
