//! HTTP [`FallbackStore`] over a PostgREST-style generic table.
//!
//! Rows have the shape `{ "key", "user_id", "value" }` with a unique
//! constraint on `(user_id, key)`. Writes are upserts
//! (`Prefer: resolution=merge-duplicates`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratum_core::{FallbackStore, Record, StorageKey, TierError, UserScope};
use tracing::debug;

use crate::storage::rest::{RestClient, RestEndpoint};

/// Connection settings for [`RestFallbackStore`].
#[derive(Debug, Clone)]
pub struct RestFallbackConfig {
    pub endpoint: RestEndpoint,
    pub table: String,
}

impl Default for RestFallbackConfig {
    fn default() -> Self {
        Self {
            endpoint: RestEndpoint::default(),
            table: "app_storage".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RowUpsert<'a> {
    key: &'a str,
    user_id: &'a str,
    value: &'a Record,
}

#[derive(Debug, Deserialize)]
struct RowValue {
    value: Record,
}

/// Generic remote key/value table reached over HTTP.
pub struct RestFallbackStore {
    client: RestClient,
    table: String,
}

impl RestFallbackStore {
    /// Builds a store with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: RestFallbackConfig) -> anyhow::Result<Self> {
        Ok(Self::with_client(RestClient::new(config.endpoint)?, config.table))
    }

    /// Builds a store sharing an existing client, e.g. with entity adapters.
    #[must_use]
    pub fn with_client(client: RestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn table_url(&self) -> String {
        self.client.table_url(&self.table)
    }

    fn row_filter(key: &StorageKey, scope: &UserScope) -> [(&'static str, String); 2] {
        [
            ("key", format!("eq.{key}")),
            ("user_id", format!("eq.{scope}")),
        ]
    }
}

#[async_trait]
impl FallbackStore for RestFallbackStore {
    async fn get(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<Option<Record>, TierError> {
        let request = self
            .client
            .http()
            .get(self.table_url())
            .query(&Self::row_filter(key, scope))
            .query(&[("select", "value")]);
        let response = self.client.send(request).await?;
        let mut rows: Vec<RowValue> = response
            .json()
            .await
            .map_err(|e| TierError::Decode(e.to_string()))?;
        debug!(key = %key, scope = %scope, rows = rows.len(), "fallback row fetched");
        Ok(rows.pop().map(|row| row.value))
    }

    async fn put(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> Result<(), TierError> {
        let row = RowUpsert {
            key: key.as_str(),
            user_id: scope.as_str(),
            value: record,
        };
        let request = self
            .client
            .http()
            .post(self.table_url())
            .query(&[("on_conflict", "user_id,key")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.client.send(request).await?;
        Ok(())
    }

    async fn delete(&self, key: &StorageKey, scope: &UserScope) -> Result<(), TierError> {
        let request = self
            .client
            .http()
            .delete(self.table_url())
            .query(&Self::row_filter(key, scope));
        self.client.send(request).await?;
        Ok(())
    }
}
