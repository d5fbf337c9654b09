//! File templating task.

use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

use tasktree::{Executor, Task, TaskElement, TaskError};

/// Template task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Template file, read as given.
    pub src: PathBuf,

    /// Output file.
    pub dest: PathBuf,

    /// Permission bits of the output file (default: 0o644).
    #[serde(default = "default_mode", deserialize_with = "deserialize_mode")]
    pub mode: u32,
}

fn default_mode() -> u32 {
    0o644
}

/// Accept either an integer or an octal string such as `"0600"`.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Bits(u32),
        Octal(String),
    }

    match Mode::deserialize(deserializer)? {
        Mode::Bits(bits) => Ok(bits),
        Mode::Octal(text) => {
            let digits = text.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8)
                .map_err(|e| serde::de::Error::custom(format!("invalid mode '{}': {}", text, e)))
        }
    }
}

/// Renders `src` against the current facts and writes the result to `dest`.
#[derive(Debug, Default)]
pub struct TemplateTask {
    config: Option<TemplateConfig>,
}

impl Task for TemplateTask {
    fn name(&self) -> &'static str {
        "template"
    }

    fn init(&mut self, element: &TaskElement<'_>) -> Result<(), TaskError> {
        self.config = Some(element.read_config()?);
        Ok(())
    }

    fn run(&mut self, executor: &mut dyn Executor) -> Result<Option<serde_json::Value>, TaskError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| TaskError::Configuration("template task not initialized".to_string()))?;

        let source = std::fs::read_to_string(&config.src).map_err(|e| {
            TaskError::Io(format!("Failed to read {}: {}", config.src.display(), e))
        })?;
        let rendered = executor
            .resolver()
            .resolve(&source, executor.current_config())?;

        std::fs::write(&config.dest, &rendered).map_err(|e| {
            TaskError::Io(format!("Failed to write {}: {}", config.dest.display(), e))
        })?;
        set_mode(&config.dest, config.mode)?;

        tracing::info!(
            src = %config.src.display(),
            dest = %config.dest.display(),
            mode = %format!("{:o}", config.mode),
            "Rendered template"
        );
        Ok(Some(serde_json::Value::String(rendered)))
    }
}

#[cfg(unix)]
fn set_mode(path: &std::path::Path, mode: u32) -> Result<(), TaskError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &std::path::Path, _mode: u32) -> Result<(), TaskError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<TemplateConfig, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_mode_default() {
        let config = parse(json!({"src": "a.j2", "dest": "a"})).unwrap();
        assert_eq!(config.mode, 0o644);
    }

    #[test]
    fn test_mode_octal_string() {
        let config = parse(json!({"src": "a.j2", "dest": "a", "mode": "0600"})).unwrap();
        assert_eq!(config.mode, 0o600);

        let config = parse(json!({"src": "a.j2", "dest": "a", "mode": "0o755"})).unwrap();
        assert_eq!(config.mode, 0o755);
    }

    #[test]
    fn test_mode_integer() {
        let config = parse(json!({"src": "a.j2", "dest": "a", "mode": 384})).unwrap();
        assert_eq!(config.mode, 0o600);
    }

    #[test]
    fn test_mode_invalid() {
        assert!(parse(json!({"src": "a.j2", "dest": "a", "mode": "rw-r--r--"})).is_err());
    }
}
