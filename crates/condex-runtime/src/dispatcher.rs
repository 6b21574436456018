//! Evaluation Dispatcher
//!
//! Tests a condition tree against an in-memory item. Each node is resolved
//! to its condition type, then either expanded (macro types) or handed to the
//! evaluator registered under the type's evaluator key. Evaluators recurse
//! into sub-conditions through the dispatcher they are given.

use crate::error::{Result, RuntimeError};
use condex_core::contextualize::contextualize;
use condex_core::observability::{names, Metrics, Span, Tracer};
use condex_core::{
    Condition, ConditionType, ConditionTypeResolver, ContextualizationPolicy, EngineConfig,
    ExecutionContext, Item, PastEventCounter, ScriptEvaluator,
};
use dashmap::DashMap;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Direct-evaluation strategy for one kind of condition
pub trait ConditionEvaluator: Send + Sync {
    /// Test `condition` against `item`. Sub-conditions go back through
    /// `dispatcher` so macro expansion and contextualization apply at every
    /// depth.
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool>;
}

impl<F> ConditionEvaluator for F
where
    F: Fn(&Condition, Option<&Item>, &ExecutionContext, &ConditionEvaluatorDispatcher) -> Result<bool>
        + Send
        + Sync,
{
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        self(condition, item, context, dispatcher)
    }
}

/// Evaluation dispatcher
///
/// The evaluator map is concurrent: evaluators can be registered and removed
/// while evaluations run on other threads.
pub struct ConditionEvaluatorDispatcher {
    resolver: Arc<dyn ConditionTypeResolver>,
    evaluators: DashMap<String, Arc<dyn ConditionEvaluator>>,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
    past_event_counter: Option<Arc<dyn PastEventCounter>>,
    metrics: Option<Arc<dyn Metrics>>,
    tracer: Option<Arc<dyn Tracer>>,
    config: EngineConfig,
}

impl ConditionEvaluatorDispatcher {
    /// Create a dispatcher with no evaluators registered
    pub fn new(resolver: Arc<dyn ConditionTypeResolver>) -> Self {
        Self {
            resolver,
            evaluators: DashMap::new(),
            scripts: None,
            past_event_counter: None,
            metrics: None,
            tracer: None,
            config: EngineConfig::default(),
        }
    }

    /// Register every built-in evaluator
    pub fn with_builtin_evaluators(self) -> Self {
        for (key, evaluator) in crate::evaluators::builtin_evaluators() {
            self.evaluators.insert(key.to_string(), evaluator);
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

    pub fn with_past_event_counter(mut self, counter: Arc<dyn PastEventCounter>) -> Self {
        self.past_event_counter = Some(counter);
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

    /// Register an evaluator, returning the one it replaces
    pub fn register_evaluator(
        &self,
        key: impl Into<String>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Option<Arc<dyn ConditionEvaluator>> {
        let key = key.into();
        debug!(evaluator_key = %key, "registering condition evaluator");
        self.evaluators.insert(key, evaluator)
    }

    pub fn unregister_evaluator(&self, key: &str) -> Option<Arc<dyn ConditionEvaluator>> {
        debug!(evaluator_key = %key, "unregistering condition evaluator");
        self.evaluators.remove(key).map(|(_, evaluator)| evaluator)
    }

    pub fn has_evaluator(&self, key: &str) -> bool {
        self.evaluators.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn evaluator_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.evaluators.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<dyn ConditionTypeResolver> {
        &self.resolver
    }

    pub fn past_event_counter(&self) -> Option<&Arc<dyn PastEventCounter>> {
        self.past_event_counter.as_ref()
    }

    /// Evaluate `condition` against `item`.
    ///
    /// An unresolvable condition type evaluates to `false`. A resolvable type
    /// with no matching evaluator is an error.
    pub fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
    ) -> Result<bool> {
        let Some(condition_type) = self.resolver.resolve(&condition.condition_type_id) else {
            debug!(condition = ?condition, "condition type not resolved");
            warn!(
                "Unresolved condition type '{}', evaluating to false",
                condition.condition_type_id
            );
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::UNRESOLVED_TYPE).inc();
            }
            return Ok(false);
        };

        let started = Instant::now();
        let span = self
            .tracer
            .as_ref()
            .map(|tracer| tracer.start_span(&condition.condition_type_id));

        let result = self.eval_resolved(condition, &condition_type, item, context);

        self.observe(started, span, &result);
        result
    }

    fn eval_resolved(
        &self,
        condition: &Condition,
        condition_type: &ConditionType,
        item: Option<&Item>,
        context: &ExecutionContext,
    ) -> Result<bool> {
        let Some(condition) = self.contextualized(condition, context)? else {
            return Ok(false);
        };

        if let Some(parent) = &condition_type.parent_condition {
            let expanded = condition_type.expansion_context(
                &condition,
                context,
                self.config.max_parent_depth,
            )?;
            return self.eval(parent, item, &expanded);
        }

        let evaluator = self.evaluator_for(condition_type)?;
        evaluator.eval(&condition, item, context, self)
    }

    /// Resolve dynamic parameters. `None` means the condition cannot match
    /// under the no-match policy.
    fn contextualized<'c>(
        &self,
        condition: &'c Condition,
        context: &ExecutionContext,
    ) -> Result<Option<Cow<'c, Condition>>> {
        match contextualize(condition, context, self.scripts.as_deref()) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(e) => match self.config.contextualization_failure {
                ContextualizationPolicy::NoMatch => {
                    warn!(
                        "Contextualization of '{}' failed, treating as no match: {}",
                        condition.condition_type_id, e
                    );
                    Ok(None)
                }
                ContextualizationPolicy::Abort => Err(e.into()),
            },
        }
    }

    fn evaluator_for(&self, condition_type: &ConditionType) -> Result<Arc<dyn ConditionEvaluator>> {
        let Some(key) = condition_type.evaluator_key.as_deref() else {
            error!("Condition type '{}' has no evaluator key", condition_type.id);
            return Err(RuntimeError::NoEvaluatorKey(condition_type.id.clone()));
        };
        // Clone the Arc out so no map guard is held while evaluating
        match self.evaluators.get(key) {
            Some(entry) => Ok(Arc::clone(entry.value())),
            None => {
                error!(
                    "No evaluator registered under '{}' for condition type '{}'",
                    key, condition_type.id
                );
                Err(RuntimeError::MissingEvaluator {
                    condition_type: condition_type.id.clone(),
                    evaluator_key: key.to_string(),
                })
            }
        }
    }

    fn observe(&self, started: Instant, span: Option<Span>, result: &Result<bool>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_execution_time(names::CONDITION_EVAL, started.elapsed());
            if let Err(e) = result {
                metrics.record_error(e.kind());
            }
        }
        if let (Some(tracer), Some(mut span)) = (&self.tracer, span) {
            match result {
                Ok(matched) => {
                    span.set_attribute("status", "ok");
                    span.set_attribute("result", matched.to_string());
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

impl fmt::Debug for ConditionEvaluatorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluatorDispatcher")
            .field("evaluators", &self.evaluator_keys())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
