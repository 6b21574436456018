//! Condition Engine SDK
//!
//! High-level API over the condition engine: one registry of condition
//! types, direct evaluation against items, compilation into search queries,
//! and schema validation.

pub mod builder;
pub mod engine;
pub mod error;
pub mod past_event;

// Re-export main types
pub use builder::ConditionEngineBuilder;
pub use engine::ConditionEngine;
pub use error::{Result, SdkError};
pub use past_event::BackendPastEventCounter;

// Re-export commonly used types from dependencies
pub use condex_compiler::{InMemoryBackend, QueryExecutor, SearchQuery};
pub use condex_core::{
    Condition, ConditionBuilder, ConditionType, EngineConfig, ExecutionContext, Item, Value,
};
