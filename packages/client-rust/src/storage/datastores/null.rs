//! No-op [`FallbackStore`] implementation.
//!
//! [`NullFallbackStore`] stands in when no remote fallback table is
//! configured. Reads miss, and writes and deletes fail as unreachable so the
//! resolver reports `remote: false` instead of claiming a write it never made.

use async_trait::async_trait;
use stratum_core::{FallbackStore, Record, StorageKey, TierError, UserScope};

/// Placeholder for "no fallback store configured".
pub struct NullFallbackStore;

const NOT_CONFIGURED: &str = "no fallback store configured";

#[async_trait]
impl FallbackStore for NullFallbackStore {
    async fn get(
        &self,
        _key: &StorageKey,
        _scope: &UserScope,
    ) -> Result<Option<Record>, TierError> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &StorageKey,
        _scope: &UserScope,
        _record: &Record,
    ) -> Result<(), TierError> {
        Err(TierError::Network(NOT_CONFIGURED.to_string()))
    }

    async fn delete(&self, _key: &StorageKey, _scope: &UserScope) -> Result<(), TierError> {
        Err(TierError::Network(NOT_CONFIGURED.to_string()))
    }

    fn is_null(&self) -> bool {
        true
    }
}
