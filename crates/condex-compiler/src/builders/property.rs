//! Property comparison builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::{escape_wildcard, RangeQuery, SearchQuery};
use condex_core::compare::text_of;
use condex_core::{ComparisonOperator, Condition, ExecutionContext, PropertyCondition};

/// Profile, session and event property conditions.
///
/// Negative operators only select items where the property is present,
/// which keeps them in line with direct evaluation: a missing property
/// never matches a comparison.
pub struct PropertyConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for PropertyConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &ExecutionContext,
        _compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let property = PropertyCondition::from_condition(condition)?;
        Ok(Some(operator_query(&property, property.operator, condition)?))
    }
}

fn operator_query(
    property: &PropertyCondition<'_>,
    operator: ComparisonOperator,
    condition: &Condition,
) -> Result<SearchQuery> {
    use ComparisonOperator::*;

    let field = property.property_name;
    let single = || {
        property.value().cloned().ok_or_else(|| {
            CompileError::invalid_parameter(
                &condition.condition_type_id,
                "propertyValue",
                format!("operator '{}' needs a value", operator),
            )
        })
    };
    let text = || -> Result<String> {
        let value = single()?;
        text_of(&value).ok_or_else(|| {
            CompileError::invalid_parameter(
                &condition.condition_type_id,
                "propertyValue",
                format!("operator '{}' needs a text value, got {}", operator, value.type_name()),
            )
        })
    };

    Ok(match operator {
        Equals => SearchQuery::term(field, single()?),
        GreaterThan => SearchQuery::Range(RangeQuery::new(field).gt(single()?)),
        GreaterThanOrEqualTo => SearchQuery::Range(RangeQuery::new(field).gte(single()?)),
        LessThan => SearchQuery::Range(RangeQuery::new(field).lt(single()?)),
        LessThanOrEqualTo => SearchQuery::Range(RangeQuery::new(field).lte(single()?)),
        Between => match property.values() {
            [low, high] => {
                SearchQuery::Range(RangeQuery::new(field).gte(low.clone()).lte(high.clone()))
            }
            other => {
                return Err(CompileError::invalid_parameter(
                    &condition.condition_type_id,
                    "propertyValues",
                    format!("'between' needs exactly two bounds, got {}", other.len()),
                ))
            }
        },
        Exists => SearchQuery::exists(field),
        Missing => SearchQuery::negate(SearchQuery::exists(field)),
        Contains => SearchQuery::Wildcard {
            field: field.to_string(),
            value: format!("*{}*", escape_wildcard(&text()?)),
        },
        StartsWith => SearchQuery::Prefix {
            field: field.to_string(),
            value: text()?,
        },
        EndsWith => SearchQuery::Wildcard {
            field: field.to_string(),
            value: format!("*{}", escape_wildcard(&text()?)),
        },
        MatchesRegex => SearchQuery::Regexp {
            field: field.to_string(),
            value: text()?,
        },
        In | HasSomeOf => SearchQuery::terms(field, property.values().to_vec()),
        All if property.values().is_empty() => SearchQuery::exists(field),
        All => SearchQuery::all_of(
            property
                .values()
                .iter()
                .map(|v| SearchQuery::term(field, v.clone()))
                .collect(),
        ),
        NotEquals | NotContains | NotIn | HasNoneOf => {
            return operator_query(property, operator.positive(), condition)
                .map(|q| SearchQuery::present_and_not(field, q))
        }
    })
}
