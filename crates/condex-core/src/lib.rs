//! Condex Core - condition model and shared building blocks
//!
//! This crate provides the types every other Condex crate builds on:
//! - `Value` and the `Condition` tree
//! - Condition types, their parameter schemas and the type registry
//! - Subject items and property-path lookup
//! - Execution context and the parameter contextualizer
//! - The legacy query-builder id table
//! - Past-event parameters, counter keys and synthesized conditions
//! - Geo, date and typed-comparison helpers, engine configuration, schema
//!   validation
//! - Metrics and tracing hooks

pub mod compare;
pub mod condition;
pub mod condition_type;
pub mod config;
pub mod context;
pub mod contextualize;
pub mod date;
pub mod error;
pub mod geo;
pub mod item;
pub mod legacy;
pub mod observability;
pub mod past_event;
pub mod property;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use condition::{Condition, ConditionBuilder};
pub use condition_type::{
    ConditionType, ConditionTypeRegistry, ConditionTypeResolver, Parameter, ParameterType,
};
pub use self::config::{ContextualizationPolicy, EngineConfig, PastEventFallback};
pub use context::ExecutionContext;
pub use contextualize::{contextualize, ScriptEvaluator};
pub use error::{ContextualizeError, CoreError, Result};
pub use item::Item;
pub use legacy::resolve_legacy_builder_id;
pub use past_event::{PastEventCounter, PastEventParams};
pub use property::{ComparisonOperator, PropertyCondition};
pub use types::Value;
pub use validation::{ConditionValidator, ValidationError};
