//! In-process [`DurableAdapter`] simulating one entity table.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use stratum_core::{DurableAdapter, Record, StorageKey, TierError, UserScope};

use crate::storage::fault::{FaultOp, FaultSwitch};

/// Entity table for a single storage key, one record per user scope.
pub struct MemoryDurableAdapter {
    key: StorageKey,
    rows: DashMap<String, Record>,
    faults: FaultSwitch,
    deletable: bool,
}

impl MemoryDurableAdapter {
    /// Creates an adapter that supports deletion.
    #[must_use]
    pub fn new(key: StorageKey) -> Self {
        Self {
            key,
            rows: DashMap::new(),
            faults: FaultSwitch::new(),
            deletable: true,
        }
    }

    /// Disables [`DurableAdapter::delete`], like an append-only entity table.
    #[must_use]
    pub fn without_delete(mut self) -> Self {
        self.deletable = false;
        self
    }

    #[must_use]
    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    /// Reads the stored row directly, bypassing fault injection.
    #[must_use]
    pub fn peek(&self, scope: &UserScope) -> Option<Record> {
        self.rows.get(scope.as_str()).map(|r| r.value().clone())
    }

    /// Scopes that currently have a row.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
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

#[async_trait]
impl DurableAdapter for MemoryDurableAdapter {
    fn key(&self) -> &StorageKey {
        &self.key
    }

    async fn read(&self, scope: &UserScope) -> Result<Option<Record>, TierError> {
        let corrupt = self.faults.check(FaultOp::Read).await?;
        let found = self.peek(scope);
        Ok(match found {
            Some(_) if corrupt => Some(Record::new(json!({ "corrupted": true }))),
            other => other,
        })
    }

    async fn write(&self, scope: &UserScope, record: &Record) -> Result<(), TierError> {
        self.faults.check(FaultOp::Write).await?;
        self.rows.insert(scope.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, scope: &UserScope) -> Result<(), TierError> {
        if !self.deletable {
            return Err(TierError::Unsupported);
        }
        self.faults.check(FaultOp::Delete).await?;
        self.rows.remove(scope.as_str());
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        self.deletable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MemoryDurableAdapter {
        MemoryDurableAdapter::new(StorageKey::new("customers").unwrap())
    }

    #[tokio::test]
    async fn write_read_delete() {
        let adapter = adapter();
        let scope = UserScope::user("user-42").unwrap();
        let record = Record::new(json!([{"id": "c1"}]));

        assert!(adapter.read(&scope).await.unwrap().is_none());
        adapter.write(&scope, &record).await.unwrap();
        assert_eq!(adapter.read(&scope).await.unwrap(), Some(record));
        assert_eq!(adapter.scopes(), vec!["user-42"]);

        adapter.delete(&scope).await.unwrap();
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn append_only_adapter_refuses_delete() {
        let adapter = adapter().without_delete();
        let scope = UserScope::user("u").unwrap();
        adapter.write(&scope, &Record::new(json!(1))).await.unwrap();

        assert!(!adapter.supports_delete());
        assert!(matches!(
            adapter.delete(&scope).await,
            Err(TierError::Unsupported)
        ));
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn faults_block_writes() {
        let adapter = adapter();
        let scope = UserScope::user("u").unwrap();
        adapter.faults().make_unreachable();
        assert!(adapter.write(&scope, &Record::new(json!(1))).await.is_err());
        assert!(adapter.peek(&scope).is_none());
    }
}
