//! Registry of entity-specific durable adapters.
//!
//! [`AdapterRegistry`] is the injection point for the Durable Remote Store:
//! at most one [`DurableAdapter`] per [`StorageKey`], looked up by the
//! resolver, the migration sweeper, and the status prober.

mod memory;
mod rest;

pub use memory::MemoryDurableAdapter;
pub use rest::RestEntityAdapter;

use std::collections::BTreeMap;
use std::sync::Arc;

use stratum_core::{DurableAdapter, StorageKey};

/// Durable adapters indexed by the storage key they serve.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<StorageKey, Arc<dyn DurableAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own key, replacing any previous one.
    ///
    /// Returns the replaced adapter, if any.
    pub fn register(&mut self, adapter: Arc<dyn DurableAdapter>) -> Option<Arc<dyn DurableAdapter>> {
        self.adapters.insert(adapter.key().clone(), adapter)
    }

    /// Builder-style [`register`](AdapterRegistry::register).
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn DurableAdapter>) -> Self {
        self.register(adapter);
        self
    }

    #[must_use]
    pub fn get(&self, key: &StorageKey) -> Option<Arc<dyn DurableAdapter>> {
        self.adapters.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.adapters.contains_key(key)
    }

    /// Iterates adapters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StorageKey, &Arc<dyn DurableAdapter>)> {
        self.adapters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
