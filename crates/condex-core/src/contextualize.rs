//! Parameter Contextualizer
//!
//! Resolves dynamic parameter values before a tree is evaluated or compiled.
//! Two marker prefixes are recognized on string values:
//!
//! - `parameter::<name>` reads `<name>` from the execution context
//! - `script::<expression>` asks the [`ScriptEvaluator`] for a value
//!
//! A tree with no marker anywhere comes back as `Cow::Borrowed`, untouched.
//! Otherwise a new tree holding only literal values is returned; subtrees
//! without markers are carried over as they are, never re-resolved.
//!
//! Null handling: a reference that resolves to nothing fails the enclosing
//! map (condition parameters or object values); inside a list the entry is
//! dropped instead.

use crate::condition::Condition;
use crate::context::ExecutionContext;
use crate::error::ContextualizeError;
use crate::types::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const PARAMETER_MARKER: &str = "parameter::";
pub const SCRIPT_MARKER: &str = "script::";

type Result<T> = std::result::Result<T, ContextualizeError>;

/// Opaque expression evaluation service.
///
/// `Ok(Value::Null)` means the expression evaluated to null; `Err` means the
/// evaluation itself failed. The two are handled differently.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &ExecutionContext) -> anyhow::Result<Value>;
}

impl<F> ScriptEvaluator for F
where
    F: Fn(&str, &ExecutionContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn evaluate(&self, expression: &str, context: &ExecutionContext) -> anyhow::Result<Value> {
        self(expression, context)
    }
}

/// True when `value` is a `parameter::` or `script::` reference
pub fn is_dynamic_reference(value: &str) -> bool {
    value.starts_with(PARAMETER_MARKER) || value.starts_with(SCRIPT_MARKER)
}

/// Whether any parameter of the tree (nested conditions included) is dynamic
pub fn has_dynamic_values(condition: &Condition) -> bool {
    condition.parameter_values.values().any(value_is_dynamic)
}

fn value_is_dynamic(value: &Value) -> bool {
    match value {
        Value::String(s) => is_dynamic_reference(s),
        Value::Array(items) => items.iter().any(value_is_dynamic),
        Value::Object(map) => map.values().any(value_is_dynamic),
        Value::Condition(c) => has_dynamic_values(c),
        _ => false,
    }
}

/// Resolve every dynamic parameter of `condition` against `context`
pub fn contextualize<'a>(
    condition: &'a Condition,
    context: &ExecutionContext,
    scripts: Option<&dyn ScriptEvaluator>,
) -> Result<Cow<'a, Condition>> {
    Resolver { context, scripts }.resolve_condition(condition)
}

/// Every resolve step hands back `Cow::Borrowed` for a value with nothing
/// dynamic inside, so static subtrees are never rebuilt.
struct Resolver<'c> {
    context: &'c ExecutionContext,
    scripts: Option<&'c dyn ScriptEvaluator>,
}

impl Resolver<'_> {
    fn resolve_condition<'a>(&self, condition: &'a Condition) -> Result<Cow<'a, Condition>> {
        Ok(match self.resolve_map(&condition.parameter_values)? {
            Cow::Borrowed(_) => Cow::Borrowed(condition),
            Cow::Owned(parameter_values) => Cow::Owned(Condition {
                condition_type_id: condition.condition_type_id.clone(),
                parameter_values,
            }),
        })
    }

    fn resolve_map<'a>(
        &self,
        map: &'a BTreeMap<String, Value>,
    ) -> Result<Cow<'a, BTreeMap<String, Value>>> {
        let mut resolved: Option<BTreeMap<String, Value>> = None;
        for (name, value) in map {
            if let Cow::Owned(value) = self.resolve_required(value)? {
                resolved
                    .get_or_insert_with(|| map.clone())
                    .insert(name.clone(), value);
            }
        }
        Ok(resolved.map_or(Cow::Borrowed(map), Cow::Owned))
    }

    /// Resolve a map entry: a reference to nothing is an error
    fn resolve_required<'a>(&self, value: &'a Value) -> Result<Cow<'a, Value>> {
        match value {
            Value::String(s) if is_dynamic_reference(s) => match self.resolve_reference(s)? {
                Some(resolved) => Ok(Cow::Owned(resolved)),
                None => Err(null_error(s)),
            },
            other => self.resolve_nested(other),
        }
    }

    fn resolve_nested<'a>(&self, value: &'a Value) -> Result<Cow<'a, Value>> {
        match value {
            Value::Array(items) => {
                let mut resolved: Option<Vec<Value>> = None;
                for (index, item) in items.iter().enumerate() {
                    let entry = match item {
                        Value::String(s) if is_dynamic_reference(s) => {
                            self.resolve_reference(s)?.map(Cow::Owned)
                        }
                        other => Some(self.resolve_nested(other)?),
                    };
                    if resolved.is_none() && !matches!(entry, Some(Cow::Borrowed(_))) {
                        resolved = Some(items[..index].to_vec());
                    }
                    if let (Some(list), Some(entry)) = (resolved.as_mut(), entry) {
                        list.push(entry.into_owned());
                    }
                }
                Ok(resolved.map_or(Cow::Borrowed(value), |list| Cow::Owned(Value::Array(list))))
            }
            Value::Object(map) => Ok(match self.resolve_map(map)? {
                Cow::Borrowed(_) => Cow::Borrowed(value),
                Cow::Owned(map) => Cow::Owned(Value::Object(map)),
            }),
            Value::Condition(c) => Ok(match self.resolve_condition(c)? {
                Cow::Borrowed(_) => Cow::Borrowed(value),
                Cow::Owned(c) => Cow::Owned(Value::Condition(Box::new(c))),
            }),
            _ => Ok(Cow::Borrowed(value)),
        }
    }

    /// `Ok(None)` when the reference resolves to nothing
    fn resolve_reference(&self, reference: &str) -> Result<Option<Value>> {
        if let Some(name) = reference.strip_prefix(PARAMETER_MARKER) {
            return Ok(self.context.get(name).filter(|v| !v.is_null()).cloned());
        }
        let expression = reference.strip_prefix(SCRIPT_MARKER).unwrap_or(reference);
        let scripts = self
            .scripts
            .ok_or_else(|| ContextualizeError::NoScriptEvaluator(expression.to_string()))?;
        let value = scripts
            .evaluate(expression, self.context)
            .map_err(|e| ContextualizeError::Script {
                expression: expression.to_string(),
                message: format!("{:#}", e),
            })?;
        Ok(if value.is_null() { None } else { Some(value) })
    }
}

fn null_error(reference: &str) -> ContextualizeError {
    match reference.strip_prefix(PARAMETER_MARKER) {
        Some(name) => ContextualizeError::MissingParameter(name.to_string()),
        None => ContextualizeError::NullValue(reference.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(value: impl Into<Value>) -> Condition {
        Condition::new("profilePropertyCondition")
            .with_parameter("propertyName", "properties.age")
            .with_parameter("comparisonOperator", "greaterThan")
            .with_parameter("propertyValueInteger", value)
    }

    #[test]
    fn test_static_tree_is_borrowed() {
        let cond = property(18);
        let result = contextualize(&cond, &ExecutionContext::new(), None).unwrap();
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_parameter_reference_resolved() {
        let cond = property("parameter::minAge");
        let ctx = ExecutionContext::new().with("minAge", 21);

        let result = contextualize(&cond, &ctx, None).unwrap();
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result.i64_parameter("propertyValueInteger"), Some(21));
    }

    #[test]
    fn test_missing_parameter_in_map_fails() {
        let cond = property("parameter::minAge");
        let err = contextualize(&cond, &ExecutionContext::new(), None).unwrap_err();
        assert_eq!(err, ContextualizeError::MissingParameter("minAge".to_string()));
    }

    #[test]
    fn test_missing_entries_dropped_from_lists() {
        let cond = Condition::new("idsCondition").with_parameter(
            "ids",
            Value::Array(vec![
                Value::from("a"),
                Value::from("parameter::other"),
                Value::from("parameter::missing"),
            ]),
        );
        let ctx = ExecutionContext::new().with("other", "b");

        let result = contextualize(&cond, &ctx, None).unwrap();
        assert_eq!(
            result.string_list_parameter("ids"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_script_reference() {
        let scripts = |expr: &str, ctx: &ExecutionContext| -> anyhow::Result<Value> {
            match expr {
                "profile.age + 1" => Ok(ctx.get("age").and_then(Value::as_f64).map(|a| a + 1.0).into()),
                "nothing" => Ok(Value::Null),
                _ => Err(anyhow::anyhow!("syntax error")),
            }
        };
        let ctx = ExecutionContext::new().with("age", 40);

        let ok_cond = property("script::profile.age + 1");
        let ok = contextualize(&ok_cond, &ctx, Some(&scripts)).unwrap();
        assert_eq!(ok.i64_parameter("propertyValueInteger"), Some(41));

        let null = contextualize(&property("script::nothing"), &ctx, Some(&scripts)).unwrap_err();
        assert_eq!(null, ContextualizeError::NullValue("script::nothing".to_string()));

        let failed = contextualize(&property("script::(("), &ctx, Some(&scripts)).unwrap_err();
        assert!(matches!(failed, ContextualizeError::Script { ref expression, .. } if expression == "(("));
    }

    #[test]
    fn test_script_without_evaluator() {
        let err = contextualize(&property("script::1"), &ExecutionContext::new(), None).unwrap_err();
        assert_eq!(err, ContextualizeError::NoScriptEvaluator("1".to_string()));
    }

    #[test]
    fn test_recurses_into_sub_conditions() {
        let cond = Condition::new("booleanCondition")
            .with_parameter("operator", "and")
            .with_parameter(
                "subConditions",
                vec![property(18), property("parameter::minAge")],
            );
        let ctx = ExecutionContext::new().with("minAge", 30);

        let result = contextualize(&cond, &ctx, None).unwrap();
        let subs = result.conditions_parameter("subConditions").unwrap();
        assert_eq!(subs[0].i64_parameter("propertyValueInteger"), Some(18));
        assert_eq!(subs[1].i64_parameter("propertyValueInteger"), Some(30));
        assert!(!has_dynamic_values(&result));
    }

    #[test]
    fn test_static_subtrees_are_not_rebuilt() {
        let ctx = ExecutionContext::new().with("minAge", 30);
        let resolver = Resolver {
            context: &ctx,
            scripts: None,
        };

        let static_sub = Value::Condition(Box::new(property(18)));
        assert!(matches!(resolver.resolve_nested(&static_sub).unwrap(), Cow::Borrowed(_)));

        let static_list = Value::Array(vec![static_sub.clone(), Value::from("x")]);
        assert!(matches!(resolver.resolve_nested(&static_list).unwrap(), Cow::Borrowed(_)));

        let mixed = Value::Array(vec![
            static_sub.clone(),
            Value::Condition(Box::new(property("parameter::minAge"))),
            Value::from("parameter::missing"),
        ]);
        let Cow::Owned(Value::Array(resolved)) = resolver.resolve_nested(&mixed).unwrap() else {
            panic!("a list with a dynamic entry must be rebuilt");
        };
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], static_sub);
        assert_eq!(
            resolved[1].as_condition().and_then(|c| c.i64_parameter("propertyValueInteger")),
            Some(30)
        );
    }
}
