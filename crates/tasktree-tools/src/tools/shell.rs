//! Shell command execution task.

use serde::Deserialize;
use std::process::Command;

use tasktree::{Environment, Executor, Task, TaskElement, TaskError};

/// Shell task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Command to execute.
    #[serde(alias = "command")]
    pub cmd: String,

    /// Shell to use (default: "/bin/bash").
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Working directory.
    #[serde(default)]
    pub chdir: Option<String>,
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

/// Runs `<shell> -c <cmd>` and returns its stdout.
#[derive(Debug, Default)]
pub struct ShellTask {
    config: Option<ShellConfig>,
    environment: Environment,
}

impl ShellTask {
    /// Execute a shell command directly.
    ///
    /// The environment is added on top of the inherited process environment.
    pub fn execute_command(
        command: &str,
        shell: &str,
        cwd: Option<&str>,
        env: &Environment,
    ) -> Result<String, TaskError> {
        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(command);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(env);

        let output = cmd
            .output()
            .map_err(|e| TaskError::Process(format!("Failed to spawn process: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(TaskError::ExecutionFailed(format!(
                "Command exited with {}: {}",
                code,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Task for ShellTask {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.config = Some(element.read_config()?);
        self.environment = element.environment().clone();
        Ok(())
    }

    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| TaskError::Configuration("shell task not initialized".to_string()))?;

        if executor.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        tracing::debug!(
            command = %config.cmd,
            shell = %config.shell,
            cwd = ?config.chdir,
            env = ?self.environment,
            "Executing shell command"
        );

        let stdout =
            Self::execute_command(&config.cmd, &config.shell, config.chdir.as_deref(), &self.environment)?;
        tracing::info!(output = %stdout.trim_end(), "Shell command finished");
        Ok(Some(serde_json::Value::String(stdout)))
    }
}
