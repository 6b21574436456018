//! Live past-event counting over a query backend

use condex_compiler::{QueryCompiler, QueryExecutor, QueryTarget};
use condex_core::item::EVENT_ITEM_TYPE;
use condex_core::{Condition, ExecutionContext, PastEventCounter};
use std::sync::Arc;

/// [`PastEventCounter`] that compiles the event condition and counts the
/// matching events in a backend.
pub struct BackendPastEventCounter<Q> {
    compiler: Arc<QueryCompiler<Q>>,
    executor: Arc<dyn QueryExecutor<Q>>,
}

impl<Q: QueryTarget> BackendPastEventCounter<Q> {
    pub fn new(compiler: Arc<QueryCompiler<Q>>, executor: Arc<dyn QueryExecutor<Q>>) -> Self {
        Self { compiler, executor }
    }
}

impl<Q: QueryTarget> PastEventCounter for BackendPastEventCounter<Q> {
    fn count_events(
        &self,
        event_condition: &Condition,
        context: &ExecutionContext,
    ) -> anyhow::Result<u64> {
        let query = self
            .compiler
            .compile(event_condition, context)?
            .unwrap_or_else(Q::match_all);
        self.executor.count(&query, EVENT_ITEM_TYPE)
    }
}
