//! Query execution backends

mod memory;

pub use memory::InMemoryBackend;

use condex_core::Item;

/// Runs compiled queries against stored items of one item type
pub trait QueryExecutor<Q>: Send + Sync {
    /// Items of `item_type` matching `query`, in a stable order
    fn query(&self, query: &Q, item_type: &str) -> anyhow::Result<Vec<Item>>;

    /// Number of items of `item_type` matching `query`
    fn count(&self, query: &Q, item_type: &str) -> anyhow::Result<u64> {
        Ok(self.query(query, item_type)?.len() as u64)
    }
}
