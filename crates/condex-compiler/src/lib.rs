//! Condition query compilation
//!
//! Compiles condition trees into backend queries. The [`QueryCompiler`] is
//! generic over the query type; the built-in builders target
//! [`SearchQuery`], an Elasticsearch-shaped query DSL, and
//! [`InMemoryBackend`] executes it over stored items.

pub mod backend;
pub mod builders;
pub mod compiler;
pub mod error;
pub mod query;

// Re-export main types
pub use backend::{InMemoryBackend, QueryExecutor};
pub use builders::builtin_query_builders;
pub use compiler::{ConditionQueryBuilder, PastEventIdsProvider, QueryCompiler};
pub use error::{CompileError, Result};
pub use query::{BoolQuery, QueryTarget, RangeQuery, SearchQuery};
