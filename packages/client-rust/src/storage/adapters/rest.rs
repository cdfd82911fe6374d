//! HTTP [`DurableAdapter`] over a PostgREST entity table.
//!
//! One table per storage key, one row per user: `{ "user_id", "<column>" }`
//! with a unique constraint on `user_id`. The record lives in a single JSON
//! column (`data` by default).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use stratum_core::{DurableAdapter, Record, StorageKey, TierError, UserScope};
use tracing::debug;

use crate::storage::rest::RestClient;

/// Entity table reached over HTTP, serving exactly one storage key.
pub struct RestEntityAdapter {
    key: StorageKey,
    client: RestClient,
    table: String,
    column: String,
    deletable: bool,
}

impl RestEntityAdapter {
    #[must_use]
    pub fn new(client: RestClient, key: StorageKey, table: impl Into<String>) -> Self {
        Self {
            key,
            client,
            table: table.into(),
            column: "data".to_string(),
            deletable: true,
        }
    }

    /// Stores the record in `column` instead of `data`.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks the table append-only: deletes are refused and the status
    /// prober leaves it alone.
    #[must_use]
    pub fn append_only(mut self) -> Self {
        self.deletable = false;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn row_filter(scope: &UserScope) -> [(&'static str, String); 1] {
        [("user_id", format!("eq.{scope}"))]
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct Row(Map<String, Value>);

#[async_trait]
impl DurableAdapter for RestEntityAdapter {
    fn key(&self) -> &StorageKey {
        &self.key
    }

    async fn read(&self, scope: &UserScope) -> Result<Option<Record>, TierError> {
        let request = self
            .client
            .http()
            .get(self.client.table_url(&self.table))
            .query(&Self::row_filter(scope))
            .query(&[("select", self.column.as_str())]);
        let response = self.client.send(request).await?;
        let rows: Vec<Row> = response
            .json()
            .await
            .map_err(|e| TierError::Decode(e.to_string()))?;
        debug!(table = %self.table, scope = %scope, rows = rows.len(), "entity row fetched");

        let Some(Row(mut row)) = rows.into_iter().next() else {
            return Ok(None);
        };
        match row.remove(&self.column) {
            Some(value) => Ok(Some(Record::new(value))),
            None => Err(TierError::Decode(format!(
                "row of {} has no column {}",
                self.table, self.column
            ))),
        }
    }

    async fn write(&self, scope: &UserScope, record: &Record) -> Result<(), TierError> {
        let mut row = Map::new();
        row.insert("user_id".to_string(), Value::from(scope.as_str()));
        row.insert(self.column.clone(), record.as_value().clone());
        let request = self
            .client
            .http()
            .post(self.client.table_url(&self.table))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.client.send(request).await?;
        Ok(())
    }

    async fn delete(&self, scope: &UserScope) -> Result<(), TierError> {
        if !self.deletable {
            return Err(TierError::Unsupported);
        }
        let request = self
            .client
            .http()
            .delete(self.client.table_url(&self.table))
            .query(&Self::row_filter(scope));
        self.client.send(request).await?;
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        self.deletable
    }
}
