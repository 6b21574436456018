//! Evaluation dispatcher behaviour across condition types

use condex_core::observability::{names, InMemoryTracer, MetricsCollector};
use condex_core::{
    Condition, ConditionBuilder, ConditionType, ConditionTypeRegistry, ContextualizationPolicy,
    ContextualizeError, CoreError, EngineConfig, ExecutionContext, Item, Parameter, ParameterType,
    ScriptEvaluator, Value,
};
use condex_runtime::{ConditionEvaluator, ConditionEvaluatorDispatcher, Result, RuntimeError};
use std::sync::Arc;

fn registry() -> Arc<ConditionTypeRegistry> {
    let registry = ConditionTypeRegistry::with_builtin_types().unwrap();
    registry
        .register(
            ConditionType::new("adultProfileCondition")
                .with_parent(
                    ConditionBuilder::profile_property("properties.age")
                        .greater_than_or_equal_to("parameter::minAge"),
                )
                .with_parameter(Parameter::new("minAge", ParameterType::Integer).with_default(18)),
        )
        .unwrap();
    Arc::new(registry)
}

fn dispatcher(config: EngineConfig) -> ConditionEvaluatorDispatcher {
    ConditionEvaluatorDispatcher::new(registry())
        .with_builtin_evaluators()
        .with_config(config)
}

fn profile(age: i64, country: &str) -> Item {
    Item::profile("p1")
        .with_property("age", age)
        .with_property("country", country)
}

// ========== Macro Type Tests ==========

#[test]
fn test_macro_uses_default_parameters() {
    let dispatcher = dispatcher(EngineConfig::default());
    let ctx = ExecutionContext::new();
    let adult = Condition::new("adultProfileCondition");

    assert!(dispatcher.eval(&adult, Some(&profile(18, "FR")), &ctx).unwrap());
    assert!(!dispatcher.eval(&adult, Some(&profile(17, "FR")), &ctx).unwrap());
}

#[test]
fn test_macro_parameters_override_defaults() {
    let dispatcher = dispatcher(EngineConfig::default());
    let ctx = ExecutionContext::new();
    let over_21 = Condition::new("adultProfileCondition").with_parameter("minAge", 21);

    assert!(!dispatcher.eval(&over_21, Some(&profile(18, "FR")), &ctx).unwrap());
    assert!(dispatcher.eval(&over_21, Some(&profile(30, "FR")), &ctx).unwrap());
}

#[test]
fn test_macro_inside_composite() {
    let dispatcher = dispatcher(EngineConfig::default());
    let ctx = ExecutionContext::new();
    let condition = ConditionBuilder::and(vec![
        Condition::new("adultProfileCondition"),
        ConditionBuilder::profile_property("properties.country").equals("FR"),
    ]);

    assert!(dispatcher.eval(&condition, Some(&profile(25, "FR")), &ctx).unwrap());
    assert!(!dispatcher.eval(&condition, Some(&profile(25, "DE")), &ctx).unwrap());
}

#[test]
fn test_macro_expansion_leaves_caller_context_alone() {
    let dispatcher = dispatcher(EngineConfig::default());
    let ctx = ExecutionContext::new().with("minAge", 99);
    let before = ctx.clone();

    let over_21 = Condition::new("adultProfileCondition").with_parameter("minAge", 21);
    assert!(dispatcher.eval(&over_21, Some(&profile(30, "FR")), &ctx).unwrap());
    assert_eq!(ctx, before);
}

#[test]
fn test_parent_cycle_is_a_hard_error() {
    let registry = ConditionTypeRegistry::with_builtin_types().unwrap();
    registry
        .register(ConditionType::new("ping").with_parent(Condition::new("pong")))
        .unwrap();
    registry
        .register(ConditionType::new("pong").with_parent(Condition::new("ping")))
        .unwrap();
    let dispatcher = ConditionEvaluatorDispatcher::new(Arc::new(registry))
        .with_builtin_evaluators()
        .with_config(EngineConfig::default().with_max_parent_depth(16));

    let err = dispatcher
        .eval(&Condition::new("ping"), None, &ExecutionContext::new())
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Core(CoreError::ParentDepthExceeded { max_depth: 16, .. })
    ));
}

// ========== Contextualization Tests ==========

#[test]
fn test_parameter_reference_reads_context() {
    let dispatcher = dispatcher(EngineConfig::default());
    let condition =
        ConditionBuilder::profile_property("properties.country").equals("parameter::country");

    let fr = ExecutionContext::new().with("country", "FR");
    let de = ExecutionContext::new().with("country", "DE");
    assert!(dispatcher.eval(&condition, Some(&profile(30, "FR")), &fr).unwrap());
    assert!(!dispatcher.eval(&condition, Some(&profile(30, "FR")), &de).unwrap());
}

#[test]
fn test_script_reference_goes_to_script_evaluator() {
    let scripts: Arc<dyn ScriptEvaluator> = Arc::new(
        |expression: &str, context: &ExecutionContext| -> anyhow::Result<Value> {
            match expression {
                "profile.country" => Ok(context.get("country").cloned().unwrap_or(Value::Null)),
                other => anyhow::bail!("cannot evaluate '{}'", other),
            }
        },
    );
    let dispatcher = dispatcher(EngineConfig::default().with_contextualization_failure(ContextualizationPolicy::Abort))
        .with_script_evaluator(scripts);
    let ctx = ExecutionContext::new().with("country", "FR");

    let ok = ConditionBuilder::profile_property("properties.country").equals("script::profile.country");
    assert!(dispatcher.eval(&ok, Some(&profile(30, "FR")), &ctx).unwrap());

    let broken = ConditionBuilder::profile_property("properties.country").equals("script::nope");
    let err = dispatcher.eval(&broken, Some(&profile(30, "FR")), &ctx).unwrap_err();
    assert!(matches!(err, RuntimeError::Contextualize(ContextualizeError::Script { .. })));
}

#[test]
fn test_contextualization_failure_policy() {
    let condition =
        ConditionBuilder::profile_property("properties.country").equals("parameter::country");
    let subject = profile(30, "FR");
    let ctx = ExecutionContext::new();

    let no_match = dispatcher(EngineConfig::default());
    assert!(!no_match.eval(&condition, Some(&subject), &ctx).unwrap());

    // under no-match, only the failing branch is false
    let negated = ConditionBuilder::not(condition.clone());
    assert!(no_match.eval(&negated, Some(&subject), &ctx).unwrap());

    let abort = dispatcher(
        EngineConfig::default().with_contextualization_failure(ContextualizationPolicy::Abort),
    );
    let err = abort.eval(&condition, Some(&subject), &ctx).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Contextualize(ContextualizeError::MissingParameter(ref name)) if name == "country"
    ));
}

// ========== Date Tests ==========

#[test]
fn test_date_math_against_event_timestamps() {
    let dispatcher = dispatcher(EngineConfig::default());
    let ctx = ExecutionContext::new();
    let event = Item::event("e1", "view", "p1")
        .with_timestamp(chrono::Utc::now() - chrono::Duration::days(1));

    for expr in ["now-30d", "now-1M", "now-1y", "now-7d/d"] {
        let after = ConditionBuilder::event_property("timeStamp")
            .as_date()
            .greater_than(expr);
        assert!(dispatcher.eval(&after, Some(&event), &ctx).unwrap(), "{}", expr);

        let before = ConditionBuilder::event_property("timeStamp")
            .as_date()
            .less_than(expr);
        assert!(!dispatcher.eval(&before, Some(&event), &ctx).unwrap(), "{}", expr);
    }
}

#[test]
fn test_malformed_date_operand_is_an_error() {
    let dispatcher = dispatcher(EngineConfig::default());
    let event = Item::event("e1", "view", "p1").with_timestamp(chrono::Utc::now());
    let condition = ConditionBuilder::event_property("timeStamp")
        .as_date()
        .greater_than("two weeks ago");
    let err = dispatcher
        .eval(&condition, Some(&event), &ExecutionContext::new())
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::InvalidParameter { ref parameter, .. } if parameter == "propertyValueDate"
    ));
}

// ========== Observability Tests ==========

#[test]
fn test_spans_and_metrics_do_not_change_results() {
    let metrics = Arc::new(MetricsCollector::new());
    let tracer = Arc::new(InMemoryTracer::new());
    let observed = dispatcher(EngineConfig::default())
        .with_metrics(metrics.clone())
        .with_tracer(tracer.clone());
    let plain = dispatcher(EngineConfig::default());

    let condition = ConditionBuilder::and(vec![
        Condition::new("adultProfileCondition"),
        ConditionBuilder::profile_property("properties.country").equals("FR"),
        Condition::new("uninstalledPluginCondition"),
    ]);
    let ctx = ExecutionContext::new();
    let subject = profile(30, "FR");

    assert_eq!(
        observed.eval(&condition, Some(&subject), &ctx).unwrap(),
        plain.eval(&condition, Some(&subject), &ctx).unwrap()
    );

    let boolean_spans = tracer.spans_for("booleanCondition");
    assert_eq!(boolean_spans.len(), 1);
    assert_eq!(boolean_spans[0].attribute("status"), Some("ok"));
    assert_eq!(boolean_spans[0].attribute("result"), Some("false"));
    assert!(boolean_spans[0].is_finished());
    assert_eq!(tracer.spans_for("adultProfileCondition").len(), 1);
    assert_eq!(tracer.spans_for("profilePropertyCondition").len(), 2);

    assert_eq!(metrics.counter_value(names::UNRESOLVED_TYPE), 1);
    assert!(metrics
        .histogram_names()
        .contains(&format!("{}_duration", names::CONDITION_EVAL)));
}

#[test]
fn test_error_span_carries_message() {
    let tracer = Arc::new(InMemoryTracer::new());
    let dispatcher = dispatcher(EngineConfig::default()).with_tracer(tracer.clone());

    let _ = dispatcher.eval(&Condition::new("notCondition"), None, &ExecutionContext::new());

    let spans = tracer.spans_for("notCondition");
    assert_eq!(spans[0].attribute("status"), Some("error"));
    assert!(spans[0].attribute("message").unwrap().contains("subCondition"));
}

#[test]
fn test_observers_stay_bounded_over_many_evaluations() {
    use condex_core::observability::metrics::DEFAULT_HISTOGRAM_SAMPLES;
    use condex_core::observability::Metrics;

    let metrics = Arc::new(MetricsCollector::new());
    let tracer = Arc::new(InMemoryTracer::with_capacity(50));
    let dispatcher = dispatcher(EngineConfig::default())
        .with_metrics(metrics.clone())
        .with_tracer(tracer.clone());

    // one boolean node plus two property leaves per evaluation
    let condition = ConditionBuilder::and(vec![
        ConditionBuilder::profile_property("properties.country").equals("FR"),
        ConditionBuilder::profile_property("properties.age").greater_than(18),
    ]);
    let subject = profile(30, "FR");
    for _ in 0..2_000 {
        assert!(dispatcher
            .eval(&condition, Some(&subject), &ExecutionContext::new())
            .unwrap());
    }

    assert_eq!(tracer.spans().len(), 50);
    assert_eq!(tracer.dropped(), 6_000 - 50);

    let durations = metrics.histogram(&format!("{}_duration", names::CONDITION_EVAL));
    assert_eq!(durations.count(), 6_000);
    assert_eq!(durations.retained(), DEFAULT_HISTOGRAM_SAMPLES);
}

// ========== Concurrency Tests ==========

#[test]
fn test_registration_during_evaluation() {
    let registry = registry();
    registry
        .register(ConditionType::new("pluginCondition").with_evaluator("pluginEvaluator"))
        .unwrap();
    let dispatcher = ConditionEvaluatorDispatcher::new(registry).with_builtin_evaluators();
    let condition = ConditionBuilder::and(vec![
        ConditionBuilder::profile_property("properties.country").equals("FR"),
        ConditionBuilder::match_all(),
    ]);
    let subject = profile(30, "FR");
    let ctx = ExecutionContext::new();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    assert!(dispatcher.eval(&condition, Some(&subject), &ctx).unwrap());
                }
            });
        }
        scope.spawn(|| {
            for i in 0..200 {
                let plugin: Arc<dyn ConditionEvaluator> = Arc::new(
                    move |_: &Condition,
                          _: Option<&Item>,
                          _: &ExecutionContext,
                          _: &ConditionEvaluatorDispatcher|
                          -> Result<bool> { Ok(i % 2 == 0) },
                );
                dispatcher.register_evaluator("pluginEvaluator", plugin);
                dispatcher.unregister_evaluator("pluginEvaluator");
            }
        });
    });

    assert!(!dispatcher.has_evaluator("pluginEvaluator"));
}
