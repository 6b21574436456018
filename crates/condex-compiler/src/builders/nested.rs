//! Nested object-list builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::SearchQuery;
use condex_core::{Condition, ExecutionContext};

/// `nestedCondition`
pub struct NestedConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for NestedConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let invalid = |parameter: &str, message: &str| {
            CompileError::invalid_parameter(&condition.condition_type_id, parameter, message)
        };
        let path = condition
            .string_parameter("path")
            .ok_or_else(|| invalid("path", "a list path is required"))?;
        let sub = condition
            .condition_parameter("subCondition")
            .ok_or_else(|| invalid("subCondition", "a sub-condition is required"))?;

        match compiler.compile(sub, context)? {
            Some(query) => Ok(Some(SearchQuery::nested(path, query))),
            None => Err(CompileError::EmptyNestedQuery {
                path: path.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::test_support::builtin_compiler;
    use crate::error::CompileError;
    use crate::query::SearchQuery;
    use condex_core::{Condition, ConditionBuilder, ExecutionContext};

    #[test]
    fn test_nested_query() {
        let compiler = builtin_compiler();
        let condition = ConditionBuilder::nested(
            "properties.orders",
            ConditionBuilder::profile_property("properties.orders.status").equals("paid"),
        );
        assert_eq!(
            compiler.compile(&condition, &ExecutionContext::new()).unwrap(),
            Some(SearchQuery::nested(
                "properties.orders",
                SearchQuery::term("properties.orders.status", "paid")
            ))
        );
    }

    #[test]
    fn test_unfiltered_sub_condition_is_an_error() {
        let compiler = builtin_compiler();
        let condition = ConditionBuilder::nested(
            "properties.orders",
            ConditionBuilder::source_event_property(None, None, None, None),
        );
        let err = compiler
            .compile(&condition, &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::EmptyNestedQuery { ref path } if path == "properties.orders"));
    }

    #[test]
    fn test_path_is_required() {
        let compiler = builtin_compiler();
        let condition = Condition::new("nestedCondition")
            .with_parameter("subCondition", ConditionBuilder::match_all());
        assert!(matches!(
            compiler.compile(&condition, &ExecutionContext::new()),
            Err(CompileError::InvalidParameter { .. })
        ));
    }
}
