//! Query Compiler
//!
//! Turns a condition tree into a backend query. Each node is resolved to its
//! condition type, then either expanded (macro types) or handed to the query
//! builder registered under the type's builder key. Builders recurse into
//! sub-conditions through the compiler they are given.
//!
//! A builder may return `None`: "no filter", which the caller treats as
//! match-all.

use crate::error::{CompileError, Result};
use crate::query::QueryTarget;
use condex_core::contextualize::contextualize;
use condex_core::observability::{names, Metrics, Span, Tracer};
use condex_core::{
    resolve_legacy_builder_id, Condition, ConditionType, ConditionTypeResolver,
    ContextualizationPolicy, EngineConfig, ExecutionContext, ScriptEvaluator,
};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Query-building strategy for one kind of condition
pub trait ConditionQueryBuilder<Q>: Send + Sync {
    /// Build the query for `condition`, or `None` when it imposes no filter
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<Q>,
    ) -> Result<Option<Q>>;
}

impl<Q, F> ConditionQueryBuilder<Q> for F
where
    F: Fn(&Condition, &ExecutionContext, &QueryCompiler<Q>) -> Result<Option<Q>> + Send + Sync,
{
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<Q>,
    ) -> Result<Option<Q>> {
        self(condition, context, compiler)
    }
}

/// Profile ids whose number of matching events lies within bounds.
///
/// Used to compile a past-event condition that has no usable counter: the
/// profiles are looked up first and the condition becomes an id filter.
pub trait PastEventIdsProvider<Q>: Send + Sync {
    fn profile_ids_with_event_count(
        &self,
        event_query: &Q,
        minimum: u64,
        maximum: u64,
    ) -> anyhow::Result<Vec<String>>;
}

/// Query compiler for target query type `Q`
///
/// The builder map is concurrent: builders can be registered and removed
/// while compilations run on other threads.
pub struct QueryCompiler<Q> {
    resolver: Arc<dyn ConditionTypeResolver>,
    builders: DashMap<String, Arc<dyn ConditionQueryBuilder<Q>>>,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
    past_event_ids: Option<Arc<dyn PastEventIdsProvider<Q>>>,
    metrics: Option<Arc<dyn Metrics>>,
    tracer: Option<Arc<dyn Tracer>>,
    config: EngineConfig,
    legacy_lookups: AtomicU64,
}

impl<Q: QueryTarget> QueryCompiler<Q> {
    /// Create a compiler with no builders registered
    pub fn new(resolver: Arc<dyn ConditionTypeResolver>) -> Self {
        Self {
            resolver,
            builders: DashMap::new(),
            scripts: None,
            past_event_ids: None,
            metrics: None,
            tracer: None,
            config: EngineConfig::default(),
            legacy_lookups: AtomicU64::new(0),
        }
    }

    /// Register every builder in `builders`
    pub fn with_builders(
        self,
        builders: impl IntoIterator<Item = (&'static str, Arc<dyn ConditionQueryBuilder<Q>>)>,
    ) -> Self {
        for (key, builder) in builders {
            self.builders.insert(key.to_string(), builder);
        }
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn with_past_event_ids(mut self, provider: Arc<dyn PastEventIdsProvider<Q>>) -> Self {
        self.past_event_ids = Some(provider);
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

    /// Register a builder, returning the one it replaces
    pub fn register_builder(
        &self,
        key: impl Into<String>,
        builder: Arc<dyn ConditionQueryBuilder<Q>>,
    ) -> Option<Arc<dyn ConditionQueryBuilder<Q>>> {
        let key = key.into();
        debug!(builder_key = %key, "registering query builder");
        self.builders.insert(key, builder)
    }

    pub fn unregister_builder(&self, key: &str) -> Option<Arc<dyn ConditionQueryBuilder<Q>>> {
        debug!(builder_key = %key, "unregistering query builder");
        self.builders.remove(key).map(|(_, builder)| builder)
    }

    pub fn has_builder(&self, key: &str) -> bool {
        self.builders.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn builder_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.builders.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<dyn ConditionTypeResolver> {
        &self.resolver
    }

    pub fn past_event_ids(&self) -> Option<&Arc<dyn PastEventIdsProvider<Q>>> {
        self.past_event_ids.as_ref()
    }

    /// Builder lookups that went through the legacy id table
    pub fn count_legacy_lookups(&self) -> u64 {
        self.legacy_lookups.load(Ordering::Relaxed)
    }

    /// Compile `condition` into a query; `None` means no filter.
    ///
    /// Unlike evaluation, an unresolvable condition type is an error.
    pub fn compile(&self, condition: &Condition, context: &ExecutionContext) -> Result<Option<Q>> {
        let Some(condition_type) = self.resolver.resolve(&condition.condition_type_id) else {
            error!(
                "Unresolved condition type '{}', cannot build a query",
                condition.condition_type_id
            );
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::UNRESOLVED_TYPE).inc();
            }
            return Err(CompileError::UnresolvedType(
                condition.condition_type_id.clone(),
            ));
        };

        let started = Instant::now();
        let span = self
            .tracer
            .as_ref()
            .map(|tracer| tracer.start_span(&condition.condition_type_id));

        let result = self.compile_resolved(condition, &condition_type, context);

        self.observe(started, span, &result);
        result
    }

    fn compile_resolved(
        &self,
        condition: &Condition,
        condition_type: &ConditionType,
        context: &ExecutionContext,
    ) -> Result<Option<Q>> {
        let condition = match contextualize(condition, context, self.scripts.as_deref()) {
            Ok(resolved) => resolved,
            Err(e) => match self.config.contextualization_failure {
                ContextualizationPolicy::NoMatch => {
                    warn!(
                        "Contextualization of '{}' failed, compiling to match-none: {}",
                        condition.condition_type_id, e
                    );
                    return Ok(Some(Q::match_none()));
                }
                ContextualizationPolicy::Abort => return Err(e.into()),
            },
        };

        if let Some(parent) = &condition_type.parent_condition {
            let expanded = condition_type.expansion_context(
                &condition,
                context,
                self.config.max_parent_depth,
            )?;
            return self.compile(parent, &expanded);
        }

        let builder = self.builder_for(condition_type)?;
        builder.build_query(&condition, context, self)
    }

    /// Builder for `condition_type`: exact key first, then the legacy table
    fn builder_for(
        &self,
        condition_type: &ConditionType,
    ) -> Result<Arc<dyn ConditionQueryBuilder<Q>>> {
        let Some(key) = condition_type.query_builder_key.as_deref() else {
            error!("Condition type '{}' has no query builder key", condition_type.id);
            return Err(CompileError::NoQueryBuilderKey(condition_type.id.clone()));
        };
        if let Some(entry) = self.builders.get(key) {
            return Ok(Arc::clone(entry.value()));
        }

        if let Some(current) = resolve_legacy_builder_id(key) {
            if let Some(entry) = self.builders.get(current) {
                warn!(
                    "Condition type '{}' uses deprecated query builder id '{}', use '{}' instead",
                    condition_type.id, key, current
                );
                self.legacy_lookups.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.counter(names::LEGACY_BUILDER_ID).inc();
                }
                return Ok(Arc::clone(entry.value()));
            }
        }

        error!(
            "No query builder registered under '{}' for condition type '{}'",
            key, condition_type.id
        );
        Err(CompileError::MissingQueryBuilder {
            condition_type: condition_type.id.clone(),
            builder_key: key.to_string(),
        })
    }

    fn observe(&self, started: Instant, span: Option<Span>, result: &Result<Option<Q>>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_execution_time(names::CONDITION_COMPILE, started.elapsed());
            if let Err(e) = result {
                metrics.record_error(e.kind());
            }
        }
        if let (Some(tracer), Some(mut span)) = (&self.tracer, span) {
            match result {
                Ok(query) => {
                    span.set_attribute("status", "ok");
                    span.set_attribute("filter", if query.is_some() { "query" } else { "none" });
                }
                Err(e) => {
                    span.set_attribute("status", "error");
                    span.set_attribute("message", e.to_string());
                }
            }
            span.end();
            tracer.record_span(span);
        }
    }
}

impl<Q> fmt::Debug for QueryCompiler<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.builders.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        f.debug_struct("QueryCompiler")
            .field("builders", &keys)
            .field("config", &self.config)
            .field("legacy_lookups", &self.legacy_lookups.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchQuery;
    use condex_core::ConditionTypeRegistry;

    fn compiler_with(types: Vec<ConditionType>) -> QueryCompiler<SearchQuery> {
        let registry = ConditionTypeRegistry::new();
        for t in types {
            registry.register(t).unwrap();
        }
        QueryCompiler::new(Arc::new(registry))
    }

    fn constant(query: SearchQuery) -> Arc<dyn ConditionQueryBuilder<SearchQuery>> {
        Arc::new(
            move |_: &Condition,
                  _: &ExecutionContext,
                  _: &QueryCompiler<SearchQuery>|
                  -> Result<Option<SearchQuery>> { Ok(Some(query.clone())) },
        )
    }

    #[test]
    fn test_unresolved_type_is_an_error() {
        let compiler = compiler_with(vec![]);
        let err = compiler
            .compile(&Condition::new("gone"), &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedType(ref id) if id == "gone"));
    }

    #[test]
    fn test_missing_builder_is_an_error() {
        let compiler = compiler_with(vec![ConditionType::new("x").with_query_builder("xQuery")]);
        let err = compiler
            .compile(&Condition::new("x"), &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingQueryBuilder { ref builder_key, .. } if builder_key == "xQuery"));
    }

    #[test]
    fn test_evaluator_only_type_has_no_builder() {
        let compiler = compiler_with(vec![ConditionType::new("x").with_evaluator("xEvaluator")]);
        let err = compiler
            .compile(&Condition::new("x"), &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::NoQueryBuilderKey(_)));
    }

    #[test]
    fn test_legacy_key_falls_back_to_current_builder() {
        let compiler = compiler_with(vec![
            ConditionType::new("legacy").with_query_builder("idsConditionESQueryBuilder"),
            ConditionType::new("current").with_query_builder("idsConditionQueryBuilder"),
        ]);
        compiler.register_builder("idsConditionQueryBuilder", constant(SearchQuery::MatchAll));
        let ctx = ExecutionContext::new();

        let legacy = compiler.compile(&Condition::new("legacy"), &ctx).unwrap();
        let current = compiler.compile(&Condition::new("current"), &ctx).unwrap();
        assert_eq!(legacy, current);
        assert_eq!(compiler.count_legacy_lookups(), 1);

        compiler.compile(&Condition::new("legacy"), &ctx).unwrap();
        assert_eq!(compiler.count_legacy_lookups(), 2);
    }

    #[test]
    fn test_exact_key_wins_over_legacy_table() {
        let compiler = compiler_with(vec![
            ConditionType::new("legacy").with_query_builder("idsConditionESQueryBuilder")
        ]);
        compiler.register_builder("idsConditionESQueryBuilder", constant(SearchQuery::MatchNone));
        compiler.register_builder("idsConditionQueryBuilder", constant(SearchQuery::MatchAll));

        let query = compiler
            .compile(&Condition::new("legacy"), &ExecutionContext::new())
            .unwrap();
        assert_eq!(query, Some(SearchQuery::MatchNone));
        assert_eq!(compiler.count_legacy_lookups(), 0);
    }

    #[test]
    fn test_register_and_unregister() {
        let compiler = compiler_with(vec![ConditionType::new("x").with_query_builder("xQuery")]);
        assert!(compiler
            .register_builder("xQuery", constant(SearchQuery::MatchAll))
            .is_none());
        assert_eq!(compiler.builder_keys(), vec!["xQuery".to_string()]);
        assert!(compiler.unregister_builder("xQuery").is_some());
        assert!(!compiler.has_builder("xQuery"));
    }
}
