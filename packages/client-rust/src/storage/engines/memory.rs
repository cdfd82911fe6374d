//! In-memory [`LocalCache`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. An
//! optional byte quota mimics the capacity limit of browser-style local
//! storage.

use dashmap::DashMap;
use parking_lot::Mutex;
use stratum_core::{LocalCache, LocalCacheError};

/// In-memory local cache with an optional capacity limit.
///
/// Usage is counted as the byte length of keys plus values.
pub struct MemoryLocalCache {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
    /// Bytes currently used. Held across check-and-insert so concurrent
    /// writers cannot jointly overshoot the quota.
    used: Mutex<usize>,
}

impl MemoryLocalCache {
    /// Creates an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes: None,
            used: Mutex::new(0),
        }
    }

    /// Creates a cache that refuses writes beyond `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn used_bytes(&self) -> usize {
        *self.used.lock()
    }

    /// Drops every entry, as an end user clearing site data would.
    pub fn clear(&self) {
        let mut used = self.used.lock();
        self.entries.clear();
        *used = 0;
    }
}

impl Default for MemoryLocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCache for MemoryLocalCache {
    fn get(&self, native_key: &str) -> Result<Option<String>, LocalCacheError> {
        Ok(self.entries.get(native_key).map(|v| v.value().clone()))
    }

    fn set(&self, native_key: &str, value: String) -> Result<(), LocalCacheError> {
        let mut used = self.used.lock();
        let previous = self
            .entries
            .get(native_key)
            .map_or(0, |v| native_key.len() + v.value().len());
        let needed = native_key.len() + value.len();
        let after = *used - previous + needed;

        if let Some(quota) = self.quota_bytes {
            if after > quota {
                return Err(LocalCacheError::Quota {
                    needed,
                    available: quota.saturating_sub(*used - previous),
                });
            }
        }

        self.entries.insert(native_key.to_string(), value);
        *used = after;
        Ok(())
    }

    fn remove(&self, native_key: &str) -> Result<(), LocalCacheError> {
        let mut used = self.used.lock();
        if let Some((k, v)) = self.entries.remove(native_key) {
            *used = used.saturating_sub(k.len() + v.len());
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }
}
