//! Playbook executor: owns the scope and drives whole files.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PlaybookConfig;
use crate::element::{ElementTree, TaskConfig};
use crate::engine::Engine;
use crate::error::ExecutionError;
use crate::facts::Facts;
use crate::parser::Parser;
use crate::registry::{Executor, TaskRegistry};
use crate::template::{JinjaResolver, TemplateResolver};

/// Cooperative cancellation flag shared with a running playbook.
///
/// The engine never polls it; tasks that can stop early consult
/// [`Executor::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs playbook files against a single shared scope.
pub struct PlaybookExecutor {
    config: PlaybookConfig,
    registry: Arc<TaskRegistry>,
    resolver: Arc<dyn TemplateResolver>,
    facts: Facts,
    cancel: CancellationToken,
    depth: usize,
}

impl PlaybookExecutor {
    /// Create an executor whose scope starts from `config.extra_vars`.
    pub fn new(config: PlaybookConfig, registry: Arc<TaskRegistry>) -> Self {
        let facts = Facts::from(config.extra_vars.clone());
        Self {
            config,
            registry,
            resolver: Arc::new(JinjaResolver::new()),
            facts,
            cancel: CancellationToken::new(),
            depth: 0,
        }
    }

    /// Replace the template resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn TemplateResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PlaybookConfig {
        &self.config
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub(crate) fn facts_mut(&mut self) -> &mut Facts {
        &mut self.facts
    }

    /// Consume the executor, returning the final scope.
    pub fn into_facts(self) -> Facts {
        self.facts
    }

    /// Run a playbook file. Outermost entry point.
    pub fn run(&mut self, path: &Path, cancel: CancellationToken) -> Result<(), ExecutionError> {
        self.cancel = cancel;
        tracing::info!(
            file = %path.display(),
            base_dir = %self.config.base_dir.display(),
            vars = self.facts.len(),
            "Starting playbook run"
        );
        let result = self.execute_file(path);
        match &result {
            Ok(()) => tracing::info!(facts = self.facts.len(), "Playbook run completed"),
            Err(e) => tracing::error!(error = %e, "Playbook run failed"),
        }
        result
    }

    /// Parse and run playbook text.
    pub fn execute_str(&mut self, text: &str) -> Result<(), ExecutionError> {
        let tree = Parser::new(&self.registry).parse_str(text)?;
        self.execute_tree(&tree)
    }

    /// Run every root of a parsed tree in order.
    pub fn execute_tree(&mut self, tree: &ElementTree) -> Result<(), ExecutionError> {
        let engine = Engine::new(tree, Arc::clone(&self.registry), Arc::clone(&self.resolver));
        for id in tree.roots() {
            engine.execute(*id, self)?;
        }
        Ok(())
    }
}

impl Executor for PlaybookExecutor {
    fn execute_file(&mut self, path: &Path) -> Result<(), ExecutionError> {
        if self.depth >= self.config.max_include_depth {
            return Err(ExecutionError::IncludeDepth(self.config.max_include_depth));
        }
        let path = self.config.resolve_path(path);
        tracing::info!(file = %path.display(), depth = self.depth, "Executing playbook file");

        let tree = Parser::new(&self.registry).parse_file(&path)?;

        self.depth += 1;
        let result = self.execute_tree(&tree);
        self.depth -= 1;
        result
    }

    fn apply_config(&mut self, config: &TaskConfig) {
        self.facts.merge(config);
    }

    fn current_config(&self) -> &Facts {
        &self.facts
    }

    fn resolver(&self) -> &dyn TemplateResolver {
        self.resolver.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for PlaybookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybookExecutor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("facts", &self.facts)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
