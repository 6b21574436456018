//! Boolean and negation builders

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::SearchQuery;
use condex_core::{Condition, ExecutionContext};

/// `booleanCondition`: `and` keeps the sub-queries that filter, `or` is
/// unfiltered as soon as one operand is. An empty operand list matches
/// nothing.
pub struct BooleanConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for BooleanConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let operator = condition.string_parameter("operator").unwrap_or("and");
        let is_and = match operator.to_ascii_lowercase().as_str() {
            "and" => true,
            "or" => false,
            _ => {
                return Err(CompileError::invalid_parameter(
                    &condition.condition_type_id,
                    "operator",
                    format!("unknown boolean operator '{}', use 'and' or 'or'", operator),
                ))
            }
        };

        let subs = condition.conditions_parameter("subConditions").unwrap_or_default();
        if subs.is_empty() {
            return Ok(Some(SearchQuery::MatchNone));
        }

        let mut queries = Vec::with_capacity(subs.len());
        for sub in subs {
            match compiler.compile(sub, context)? {
                Some(query) => queries.push(query),
                // an unfiltered operand makes the whole `or` unfiltered
                None if !is_and => return Ok(None),
                None => {}
            }
        }

        if queries.is_empty() {
            return Ok(None);
        }
        Ok(Some(if is_and {
            SearchQuery::all_of(queries)
        } else {
            SearchQuery::any_of(queries)
        }))
    }
}

/// `notCondition`
pub struct NotConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for NotConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let sub = condition.condition_parameter("subCondition").ok_or_else(|| {
            CompileError::invalid_parameter(
                &condition.condition_type_id,
                "subCondition",
                "a sub-condition is required",
            )
        })?;
        Ok(Some(match compiler.compile(sub, context)? {
            Some(query) => SearchQuery::negate(query),
            // negation of "everything"
            None => SearchQuery::MatchNone,
        }))
    }
}
