//! Source-event property builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::Result;
use crate::query::QueryTarget;
use condex_core::item::SOURCE_EVENT_FIELDS;
use condex_core::{Condition, ConditionBuilder, ExecutionContext};

/// `sourceEventPropertyCondition`: an AND of equality tests on the event's
/// source fields. No filter set means no filter at all.
pub struct SourceEventPropertyConditionQueryBuilder;

impl<Q: QueryTarget> ConditionQueryBuilder<Q> for SourceEventPropertyConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<Q>,
    ) -> Result<Option<Q>> {
        let filters: Vec<Condition> = SOURCE_EVENT_FIELDS
            .iter()
            .filter_map(|(parameter, field)| {
                let expected = condition.parameter(parameter)?;
                Some(ConditionBuilder::event_property(*field).equals(expected.clone()))
            })
            .collect();
        if filters.is_empty() {
            return Ok(None);
        }
        compiler.compile(&ConditionBuilder::and(filters), context)
    }
}
