//! Identifier-set builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::SearchQuery;
use condex_core::{Condition, ExecutionContext};

/// `idsCondition`. Identifier sets are bounded by `max_ids_query_count`.
pub struct IdsConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for IdsConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &ExecutionContext,
        compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let ids = condition.string_list_parameter("ids").ok_or_else(|| {
            CompileError::invalid_parameter(
                &condition.condition_type_id,
                "ids",
                "a list of identifiers is required",
            )
        })?;
        let max = compiler.config().max_ids_query_count;
        if ids.len() > max {
            return Err(CompileError::TooManyIds {
                count: ids.len(),
                max,
            });
        }

        let query = SearchQuery::ids(ids);
        Ok(Some(if condition.bool_parameter("match").unwrap_or(true) {
            query
        } else {
            SearchQuery::negate(query)
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::test_support::builtin_compiler;
    use crate::error::CompileError;
    use crate::query::SearchQuery;
    use condex_core::{ConditionBuilder, EngineConfig, ExecutionContext};

    #[test]
    fn test_match_and_exclude() {
        let compiler = builtin_compiler();
        let ctx = ExecutionContext::new();
        let ids = vec!["p1".to_string(), "p2".to_string()];

        assert_eq!(
            compiler.compile(&ConditionBuilder::ids(ids.clone(), true), &ctx).unwrap(),
            Some(SearchQuery::ids(ids.clone()))
        );
        assert_eq!(
            compiler.compile(&ConditionBuilder::ids(ids.clone(), false), &ctx).unwrap(),
            Some(SearchQuery::negate(SearchQuery::ids(ids)))
        );
    }

    #[test]
    fn test_too_many_ids() {
        let compiler = builtin_compiler().with_config(EngineConfig::default().with_max_ids_query_count(2));
        let condition = ConditionBuilder::ids(["a", "b", "c"], true);
        let err = compiler
            .compile(&condition, &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::TooManyIds { count: 3, max: 2 }));

        let at_limit = ConditionBuilder::ids(["a", "b"], true);
        assert!(compiler.compile(&at_limit, &ExecutionContext::new()).is_ok());
    }
}
