//! Builder pattern for ConditionEngine

use crate::engine::ConditionEngine;
use crate::error::{Result, SdkError};
use crate::past_event::BackendPastEventCounter;
use condex_compiler::{
    builtin_query_builders, PastEventIdsProvider, QueryCompiler, QueryExecutor, SearchQuery,
};
use condex_core::observability::{Metrics, Tracer};
use condex_core::{ConditionTypeRegistry, EngineConfig, PastEventCounter, ScriptEvaluator};
use condex_runtime::ConditionEvaluatorDispatcher;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Builder for ConditionEngine
///
/// # Example
///
/// ```rust,ignore
/// use condex_sdk::ConditionEngineBuilder;
///
/// let engine = ConditionEngineBuilder::new()
///     .with_config_file("condex.yaml")
///     .with_condition_types_dir("types")
///     .with_backend(backend)
///     .build()?;
/// ```
pub struct ConditionEngineBuilder {
    config: EngineConfig,
    config_file: Option<PathBuf>,
    registry: Option<Arc<ConditionTypeRegistry>>,
    builtin_types: bool,
    type_files: Vec<PathBuf>,
    type_dirs: Vec<PathBuf>,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
    metrics: Option<Arc<dyn Metrics>>,
    tracer: Option<Arc<dyn Tracer>>,
    past_event_counter: Option<Arc<dyn PastEventCounter>>,
    past_event_ids: Option<Arc<dyn PastEventIdsProvider<SearchQuery>>>,
    event_executor: Option<Arc<dyn QueryExecutor<SearchQuery>>>,
}

impl ConditionEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            config_file: None,
            registry: None,
            builtin_types: true,
            type_files: Vec::new(),
            type_dirs: Vec::new(),
            scripts: None,
            metrics: None,
            tracer: None,
            past_event_counter: None,
            past_event_ids: None,
            event_executor: None,
        }
    }

    // ========== Configuration ==========

    /// Use `config` as is. Ignored when a config file is set.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a YAML file, with `CONDEX_*` environment
    /// overrides applied on top
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    // ========== Condition Types ==========

    /// Share an existing registry instead of creating one
    pub fn with_registry(mut self, registry: Arc<ConditionTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Skip the built-in condition types when creating the registry
    pub fn without_builtin_types(mut self) -> Self {
        self.builtin_types = false;
        self
    }

    /// Load condition types from a JSON or YAML file
    pub fn with_condition_types_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.type_files.push(path.into());
        self
    }

    /// Load every condition-type file in a directory
    pub fn with_condition_types_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.type_dirs.push(path.into());
        self
    }

    // ========== Collaborators ==========

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_past_event_counter(mut self, counter: Arc<dyn PastEventCounter>) -> Self {
        self.past_event_counter = Some(counter);
        self
    }

    pub fn with_past_event_ids(
        mut self,
        provider: Arc<dyn PastEventIdsProvider<SearchQuery>>,
    ) -> Self {
        self.past_event_ids = Some(provider);
        self
    }

    /// Use `backend` for past-event lookups: live event counts during
    /// evaluation and profile-id lookups during compilation
    pub fn with_backend<B>(mut self, backend: Arc<B>) -> Self
    where
        B: QueryExecutor<SearchQuery> + PastEventIdsProvider<SearchQuery> + 'static,
    {
        let executor: Arc<dyn QueryExecutor<SearchQuery>> = backend.clone();
        let provider: Arc<dyn PastEventIdsProvider<SearchQuery>> = backend;
        self.event_executor = Some(executor);
        self.past_event_ids = Some(provider);
        self
    }

    // ========== Build ==========

    /// Build the engine
    pub fn build(self) -> Result<ConditionEngine> {
        let config = match &self.config_file {
            Some(path) => EngineConfig::load(Some(path.as_path()))?,
            None => {
                self.config
                    .validate()
                    .map_err(|e| SdkError::ConfigError(e.to_string()))?;
                self.config
            }
        };

        let registry = match self.registry {
            Some(registry) => registry,
            None if self.builtin_types => Arc::new(ConditionTypeRegistry::with_builtin_types()?),
            None => Arc::new(ConditionTypeRegistry::new()),
        };
        for file in &self.type_files {
            registry.load_from_file(file)?;
        }
        for dir in &self.type_dirs {
            registry.load_from_directory(dir)?;
        }

        let mut compiler = QueryCompiler::new(registry.clone())
            .with_builders(builtin_query_builders())
            .with_config(config.clone());
        if let Some(scripts) = &self.scripts {
            compiler = compiler.with_script_evaluator(scripts.clone());
        }
        if let Some(provider) = self.past_event_ids {
            compiler = compiler.with_past_event_ids(provider);
        }
        if let Some(metrics) = &self.metrics {
            compiler = compiler.with_metrics(metrics.clone());
        }
        if let Some(tracer) = &self.tracer {
            compiler = compiler.with_tracer(tracer.clone());
        }
        let compiler = Arc::new(compiler);

        let past_event_counter = match (self.past_event_counter, self.event_executor) {
            (Some(counter), _) => Some(counter),
            (None, Some(executor)) => Some(Arc::new(BackendPastEventCounter::new(
                compiler.clone(),
                executor,
            )) as Arc<dyn PastEventCounter>),
            (None, None) => None,
        };

        let mut dispatcher = ConditionEvaluatorDispatcher::new(registry.clone())
            .with_builtin_evaluators()
            .with_config(config.clone());
        if let Some(scripts) = self.scripts {
            dispatcher = dispatcher.with_script_evaluator(scripts);
        }
        if let Some(counter) = past_event_counter {
            dispatcher = dispatcher.with_past_event_counter(counter);
        }
        if let Some(metrics) = self.metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }
        if let Some(tracer) = self.tracer {
            dispatcher = dispatcher.with_tracer(tracer);
        }

        info!(
            condition_types = registry.len(),
            evaluators = dispatcher.evaluator_keys().len(),
            query_builders = compiler.builder_keys().len(),
            "condition engine ready"
        );
        Ok(ConditionEngine::new(registry, dispatcher, compiler, config))
    }
}

impl Default for ConditionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
