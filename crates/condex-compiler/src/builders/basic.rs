//! Match-all and event-type builders

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::SearchQuery;
use condex_core::{Condition, ExecutionContext};

/// `matchAllCondition`
pub struct MatchAllConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for MatchAllConditionQueryBuilder {
    fn build_query(
        &self,
        _condition: &Condition,
        _context: &ExecutionContext,
        _compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        Ok(Some(SearchQuery::MatchAll))
    }
}

/// `eventTypeCondition`
pub struct EventTypeConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for EventTypeConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &ExecutionContext,
        _compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let event_type = condition.string_parameter("eventTypeId").ok_or_else(|| {
            CompileError::invalid_parameter(
                &condition.condition_type_id,
                "eventTypeId",
                "an event type is required",
            )
        })?;
        Ok(Some(SearchQuery::term("eventType", event_type)))
    }
}
