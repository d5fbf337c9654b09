//! Command line configuration loaded from the environment.

use serde::Deserialize;
use std::path::PathBuf;

use tasktree::PlaybookConfig;

/// Defaults taken from environment variables.
///
/// Environment variables are prefixed with `TASKTREE_`:
/// - `TASKTREE_BASE_DIR`: Directory relative playbook paths resolve against
/// - `TASKTREE_MAX_INCLUDE_DEPTH`: Nesting limit for included files
/// - `TASKTREE_LOG`: Log filter used when `RUST_LOG` is not set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliEnv {
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    #[serde(default)]
    pub max_include_depth: Option<usize>,

    #[serde(default)]
    pub log: Option<String>,
}

impl CliEnv {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("TASKTREE_").from_env::<CliEnv>()
    }

    /// Build the run configuration for a playbook rooted at `base_dir`.
    pub fn playbook_config(&self, base_dir: PathBuf) -> PlaybookConfig {
        let config = PlaybookConfig::new(base_dir);
        match self.max_include_depth {
            Some(depth) => config.with_max_include_depth(depth),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CliEnv, envy::Error> {
        envy::prefixed("TASKTREE_").from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_empty_env() {
        let env = load(&[]).unwrap();
        assert!(env.base_dir.is_none());
        assert!(env.max_include_depth.is_none());
        assert!(env.log.is_none());
    }

    #[test]
    fn test_prefixed_vars() {
        let env = load(&[
            ("TASKTREE_BASE_DIR", "/srv/playbooks"),
            ("TASKTREE_MAX_INCLUDE_DEPTH", "8"),
            ("TASKTREE_LOG", "warn"),
            ("OTHER_LOG", "trace"),
        ])
        .unwrap();

        assert_eq!(env.base_dir, Some(PathBuf::from("/srv/playbooks")));
        assert_eq!(env.max_include_depth, Some(8));
        assert_eq!(env.log.as_deref(), Some("warn"));
    }

    #[test]
    fn test_invalid_depth() {
        assert!(load(&[("TASKTREE_MAX_INCLUDE_DEPTH", "deep")]).is_err());
    }

    #[test]
    fn test_playbook_config() {
        let env = CliEnv {
            max_include_depth: Some(3),
            ..CliEnv::default()
        };
        let config = env.playbook_config(PathBuf::from("/tmp"));
        assert_eq!(config.base_dir, PathBuf::from("/tmp"));
        assert_eq!(config.max_include_depth, 3);

        let config = CliEnv::default().playbook_config(PathBuf::from("."));
        assert_eq!(config.max_include_depth, 64);
    }
}
