//! ConditionEngine - evaluation, compilation and validation behind one API

use crate::builder::ConditionEngineBuilder;
use crate::error::{Result, SdkError};
use condex_compiler::{ConditionQueryBuilder, QueryCompiler, QueryTarget, SearchQuery};
use condex_core::{
    Condition, ConditionTypeRegistry, ConditionValidator, EngineConfig, ExecutionContext, Item,
    ValidationError,
};
use condex_runtime::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use std::sync::Arc;

/// One registry and one configuration shared by the evaluation dispatcher
/// and the query compiler
pub struct ConditionEngine {
    registry: Arc<ConditionTypeRegistry>,
    dispatcher: ConditionEvaluatorDispatcher,
    compiler: Arc<QueryCompiler<SearchQuery>>,
    config: EngineConfig,
}

impl ConditionEngine {
    pub(crate) fn new(
        registry: Arc<ConditionTypeRegistry>,
        dispatcher: ConditionEvaluatorDispatcher,
        compiler: Arc<QueryCompiler<SearchQuery>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            compiler,
            config,
        }
    }

    pub fn builder() -> ConditionEngineBuilder {
        ConditionEngineBuilder::new()
    }

    /// Test `condition` against `item` with an empty context
    pub fn eval(&self, condition: &Condition, item: Option<&Item>) -> Result<bool> {
        self.eval_with(condition, item, &ExecutionContext::new())
    }

    pub fn eval_with(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
    ) -> Result<bool> {
        Ok(self.dispatcher.eval(condition, item, context)?)
    }

    /// Compile `condition`; `None` means it imposes no filter
    pub fn compile(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
    ) -> Result<Option<SearchQuery>> {
        Ok(self.compiler.compile(condition, context)?)
    }

    /// Compile `condition` into a query that can be run as is
    pub fn compile_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
    ) -> Result<SearchQuery> {
        Ok(self.compile(condition, context)?.unwrap_or_else(SearchQuery::match_all))
    }

    /// Check `condition` against the parameter schemas of its types,
    /// reporting every problem found
    pub fn validate(&self, condition: &Condition) -> std::result::Result<(), Vec<ValidationError>> {
        ConditionValidator::new(self.registry.as_ref()).validate(condition)
    }

    /// Like [`ConditionEngine::validate`], as an [`SdkError`]
    pub fn check(&self, condition: &Condition) -> Result<()> {
        self.validate(condition).map_err(SdkError::ValidationError)
    }

    // ========== Strategy Registration ==========

    pub fn register_evaluator(
        &self,
        key: impl Into<String>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Option<Arc<dyn ConditionEvaluator>> {
        self.dispatcher.register_evaluator(key, evaluator)
    }

    pub fn unregister_evaluator(&self, key: &str) -> Option<Arc<dyn ConditionEvaluator>> {
        self.dispatcher.unregister_evaluator(key)
    }

    pub fn register_query_builder(
        &self,
        key: impl Into<String>,
        builder: Arc<dyn ConditionQueryBuilder<SearchQuery>>,
    ) -> Option<Arc<dyn ConditionQueryBuilder<SearchQuery>>> {
        self.compiler.register_builder(key, builder)
    }

    pub fn unregister_query_builder(
        &self,
        key: &str,
    ) -> Option<Arc<dyn ConditionQueryBuilder<SearchQuery>>> {
        self.compiler.unregister_builder(key)
    }

    // ========== Accessors ==========

    /// Condition types; types registered here are visible to both
    /// dispatchers immediately
    pub fn registry(&self) -> &Arc<ConditionTypeRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &ConditionEvaluatorDispatcher {
        &self.dispatcher
    }

    pub fn compiler(&self) -> &Arc<QueryCompiler<SearchQuery>> {
        &self.compiler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builder lookups that went through the legacy id table
    pub fn count_legacy_lookups(&self) -> u64 {
        self.compiler.count_legacy_lookups()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condex_core::ConditionBuilder;

    fn engine() -> ConditionEngine {
        ConditionEngine::builder().build().unwrap()
    }

    #[test]
    fn test_eval_and_compile() {
        let engine = engine();
        let adult = ConditionBuilder::profile_property("properties.age").greater_than_or_equal_to(18);
        let profile = Item::profile("p1").with_property("age", 30);

        assert!(engine.eval(&adult, Some(&profile)).unwrap());
        assert!(engine.compile(&adult, &ExecutionContext::new()).unwrap().is_some());
    }

    #[test]
    fn test_compile_query_defaults_to_match_all() {
        let engine = engine();
        let unfiltered = ConditionBuilder::source_event_property(None, None, None, None);
        assert_eq!(
            engine.compile_query(&unfiltered, &ExecutionContext::new()).unwrap(),
            SearchQuery::MatchAll
        );
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let engine = engine();
        let condition = ConditionBuilder::and(vec![
            Condition::new("nestedCondition"),
            Condition::new("uninstalledPluginCondition"),
        ]);
        let errors = engine.validate(&condition).unwrap_err();
        assert!(errors.len() >= 3);
        assert!(matches!(engine.check(&condition), Err(SdkError::ValidationError(_))));
    }

    #[test]
    fn test_unresolved_type_asymmetry() {
        let engine = engine();
        let gone = Condition::new("uninstalledPluginCondition");
        assert!(!engine.eval(&gone, None).unwrap());
        assert!(matches!(
            engine.compile(&gone, &ExecutionContext::new()),
            Err(SdkError::CompileError(_))
        ));
    }
}
