//! Condex Runtime - direct evaluation of condition trees
//!
//! This crate provides the evaluation dispatcher, which tests a condition
//! tree against an in-memory item, and the built-in evaluators it dispatches
//! to.

pub mod dispatcher;
pub mod error;
pub mod evaluators;

// Re-export main types
pub use dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
pub use error::{Result, RuntimeError};
pub use evaluators::builtin_evaluators;
