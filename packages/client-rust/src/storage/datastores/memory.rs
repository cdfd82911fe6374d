//! In-process [`FallbackStore`] with switchable faults.
//!
//! Models the generic remote key/value table as a `DashMap` keyed by
//! `(scope, key)`. Used by tests and demos; deployments without a remote
//! endpoint use [`NullFallbackStore`](super::NullFallbackStore) instead.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use stratum_core::{FallbackStore, Record, StorageKey, TierError, UserScope};

use crate::storage::fault::{FaultOp, FaultSwitch};

/// Generic remote table simulated in memory.
#[derive(Default)]
pub struct MemoryFallbackStore {
    rows: DashMap<(String, String), Record>,
    faults: FaultSwitch,
}

impl MemoryFallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault switch controlling this store.
    #[must_use]
    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    /// Reads a row directly, bypassing fault injection.
    #[must_use]
    pub fn peek(&self, key: &str, scope: &UserScope) -> Option<Record> {
        self.rows
            .get(&(scope.to_string(), key.to_string()))
            .map(|r| r.value().clone())
    }

    /// All `(scope, key)` pairs currently stored.
    #[must_use]
    pub fn row_ids(&self) -> Vec<(String, String)> {
        self.rows.iter().map(|entry| entry.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn row_id(key: &StorageKey, scope: &UserScope) -> (String, String) {
    (scope.to_string(), key.to_string())
}

#[async_trait]
impl FallbackStore for MemoryFallbackStore {
    async fn get(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<Option<Record>, TierError> {
        let corrupt = self.faults.check(FaultOp::Read).await?;
        let found = self.rows.get(&row_id(key, scope)).map(|r| r.value().clone());
        Ok(match found {
            Some(_) if corrupt => Some(Record::new(json!({ "corrupted": true }))),
            other => other,
        })
    }

    async fn put(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> Result<(), TierError> {
        self.faults.check(FaultOp::Write).await?;
        self.rows.insert(row_id(key, scope), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &StorageKey, scope: &UserScope) -> Result<(), TierError> {
        self.faults.check(FaultOp::Delete).await?;
        self.rows.remove(&row_id(key, scope));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fault::Fault;

    fn key(name: &str) -> StorageKey {
        StorageKey::new(name).unwrap()
    }

    #[tokio::test]
    async fn rows_are_isolated_by_scope() {
        let store = MemoryFallbackStore::new();
        let u1 = UserScope::user("u1").unwrap();
        let u2 = UserScope::user("u2").unwrap();
        store
            .put(&key("orders"), &u1, &Record::new(json!([1])))
            .await
            .unwrap();

        assert!(store.get(&key("orders"), &u1).await.unwrap().is_some());
        assert!(store.get(&key("orders"), &u2).await.unwrap().is_none());
        assert_eq!(store.len(), 1);

        store.delete(&key("orders"), &u1).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_keeps_rows() {
        let store = MemoryFallbackStore::new();
        let scope = UserScope::user("u1").unwrap();
        store
            .put(&key("orders"), &scope, &Record::new(json!(1)))
            .await
            .unwrap();

        store.faults().make_unreachable();
        assert!(store.get(&key("orders"), &scope).await.is_err());
        assert!(store.peek("orders", &scope).is_some());
    }

    #[tokio::test]
    async fn corrupt_reads_differ_from_stored_value() {
        let store = MemoryFallbackStore::new();
        let scope = UserScope::user("u1").unwrap();
        let record = Record::new(json!({"v": 1}));
        store.put(&key("orders"), &scope, &record).await.unwrap();

        store.faults().set(FaultOp::Read, Some(Fault::Corrupt));
        let read = store.get(&key("orders"), &scope).await.unwrap().unwrap();
        assert_ne!(read, record);
        // Missing rows stay missing.
        assert!(store.get(&key("claims"), &scope).await.unwrap().is_none());
    }
}
