//! Observability hooks
//!
//! Narrow metrics and tracing interfaces the dispatchers report through.
//! Both are optional; a dispatcher returns the same results with or without
//! them attached.

pub mod metrics;
pub mod tracing;

pub use metrics::{Counter, Histogram, Metrics, MetricsCollector};
pub use tracing::{InMemoryTracer, Span, SpanContext, Tracer};

/// Metric and span names shared by the dispatchers
pub mod names {
    /// Histogram prefix for evaluation timings (`condition_eval_duration`)
    pub const CONDITION_EVAL: &str = "condition_eval";
    /// Histogram prefix for compilation timings (`condition_compile_duration`)
    pub const CONDITION_COMPILE: &str = "condition_compile";
    /// Counter bumped once per legacy builder-id mapping
    pub const LEGACY_BUILDER_ID: &str = "query_builder.legacy_id";
    /// Counter bumped when a condition type cannot be resolved
    pub const UNRESOLVED_TYPE: &str = "condition.unresolved_type";
}
