//! tasktree command line tool.
//!
//! Parses and runs playbook files with the standard task kinds.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::CliEnv;
use tasktree::{CancellationToken, PlaybookExecutor};
use tasktree_tools::create_default_registry;

#[derive(Parser)]
#[command(name = "tasktreectl")]
#[command(version, about = "Run declarative task-tree playbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a playbook file
    ///
    /// Examples:
    ///     tasktreectl run site.yaml
    ///     tasktreectl run site.yaml --set env=prod --set port=5432
    ///     tasktreectl run deploy.yaml --base-dir ./playbooks --vars '{"hosts": ["a", "b"]}'
    #[command(verbatim_doc_comment)]
    Run {
        /// Playbook file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory relative paths resolve against (default: the playbook's directory)
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// Set a variable (value parsed as JSON when possible)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        variables: Vec<String>,

        /// Initial variables as a JSON object
        #[arg(long = "vars", value_name = "JSON")]
        vars: Option<String>,

        /// Print the final facts as JSON
        #[arg(long)]
        print_facts: bool,
    },

    /// Parse a playbook without running it
    Check {
        /// Playbook file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List available task kinds
    Tasks,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let env = CliEnv::from_env().context("Invalid TASKTREE_ environment variables")?;

    init_tracing(cli.verbose, env.log.as_deref());

    let registry = Arc::new(create_default_registry().context("Failed to register tasks")?);

    match cli.command {
        Commands::Run {
            file,
            base_dir,
            variables,
            vars,
            print_facts,
        } => {
            let (base_dir, path) = resolve_locations(&file, base_dir.or_else(|| env.base_dir.clone()));
            let mut config = env.playbook_config(base_dir);
            config.extra_vars = build_variables(vars.as_deref(), &variables)?;

            let cancel = CancellationToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || {
                tracing::warn!("Interrupt received, cancelling run");
                handler_token.cancel();
            })
            .context("Failed to install Ctrl-C handler")?;

            let mut executor = PlaybookExecutor::new(config, registry);
            executor
                .run(&path, cancel)
                .with_context(|| format!("Playbook {} failed", file.display()))?;

            if print_facts {
                let facts = serde_json::to_string_pretty(executor.facts())?;
                println!("{}", facts);
            }
        }
        Commands::Check { file } => {
            let tree = tasktree::Parser::new(&registry)
                .parse_file(&file)
                .with_context(|| format!("Invalid playbook {}", file.display()))?;
            println!(
                "{}: OK ({} elements, {} top-level)",
                file.display(),
                tree.len(),
                tree.roots().len()
            );
        }
        Commands::Tasks => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// Initialize tracing. `RUST_LOG` wins, then `-v`, then `TASKTREE_LOG`.
fn init_tracing(verbose: bool, log: Option<&str>) {
    let default_filter = match (verbose, log) {
        (true, _) => "debug".to_string(),
        (false, Some(filter)) => filter.to_string(),
        (false, None) => "info,tasktree=debug".to_string(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pick the base directory and the path to hand to the executor.
///
/// Without an explicit base directory the playbook's own directory is used,
/// so includes resolve next to the file that names them.
fn resolve_locations(file: &Path, base_dir: Option<PathBuf>) -> (PathBuf, PathBuf) {
    if let Some(base_dir) = base_dir {
        return (base_dir, file.to_path_buf());
    }
    let parent = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = file
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| file.to_path_buf());
    (parent, name)
}

/// Build the initial facts from a JSON object and `--set` flags.
fn build_variables(
    vars: Option<&str>,
    variables: &[String],
) -> Result<HashMap<String, serde_json::Value>> {
    let mut result = HashMap::new();

    if let Some(vars) = vars {
        match serde_json::from_str::<serde_json::Value>(vars).context("Invalid JSON in --vars")? {
            serde_json::Value::Object(map) => result.extend(map),
            _ => bail!("--vars must be a JSON object, not an array or primitive"),
        }
    }

    // --set overrides --vars
    for var in variables {
        let parts: Vec<&str> = var.splitn(2, '=').collect();
        if parts.len() == 2 {
            let value = serde_json::from_str(parts[1])
                .unwrap_or_else(|_| serde_json::Value::String(parts[1].to_string()));
            result.insert(parts[0].to_string(), value);
        } else {
            tracing::warn!(variable = %var, "Invalid variable format, expected key=value");
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "tasktreectl",
            "run",
            "site.yaml",
            "--set",
            "a=1",
            "--set",
            "b=x",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                file, variables, ..
            } => {
                assert_eq!(file, PathBuf::from("site.yaml"));
                assert_eq!(variables, vec!["a=1", "b=x"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_build_variables() {
        let vars = build_variables(
            Some(r#"{"env": "dev", "hosts": ["a"]}"#),
            &[
                "env=prod".to_string(),
                "port=5432".to_string(),
                "url=http://x?a=b".to_string(),
                "broken".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(vars["env"], json!("prod"));
        assert_eq!(vars["hosts"], json!(["a"]));
        assert_eq!(vars["port"], json!(5432));
        assert_eq!(vars["url"], json!("http://x?a=b"));
        assert!(!vars.contains_key("broken"));
    }

    #[test]
    fn test_build_variables_rejects_non_object() {
        assert!(build_variables(Some("[1, 2]"), &[]).is_err());
        assert!(build_variables(Some("{not json"), &[]).is_err());
    }

    #[test]
    fn test_resolve_locations() {
        assert_eq!(
            resolve_locations(Path::new("playbooks/site.yaml"), None),
            (PathBuf::from("playbooks"), PathBuf::from("site.yaml"))
        );
        assert_eq!(
            resolve_locations(Path::new("site.yaml"), None),
            (PathBuf::from("."), PathBuf::from("site.yaml"))
        );
        assert_eq!(
            resolve_locations(Path::new("nested/site.yaml"), Some(PathBuf::from("/srv"))),
            (PathBuf::from("/srv"), PathBuf::from("nested/site.yaml"))
        );
    }
}
