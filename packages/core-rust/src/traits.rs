//! Collaborator contracts consumed by the resolver.
//!
//! Each tier is a trait object injected at construction time, so test
//! doubles can replace any backend independently.

use async_trait::async_trait;

use crate::error::{LocalCacheError, TierError};
use crate::key::StorageKey;
use crate::record::Record;
use crate::scope::UserScope;

/// Source of the current user's identity.
///
/// Only the output of the authentication flow is consumed: an identifier,
/// or `None` for an anonymous session.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Client-resident, always-available key/value store.
///
/// Calls are synchronous and individually atomic; the resolver adds no
/// locking of its own. Keys are native keys (see
/// [`native_key`](crate::key::native_key)).
pub trait LocalCache: Send + Sync {
    /// Read the raw string stored under `native_key`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalCacheError`] if the backing storage cannot be read.
    fn get(&self, native_key: &str) -> Result<Option<String>, LocalCacheError>;

    /// Store `value` under `native_key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`LocalCacheError::Quota`] when the write would exceed the
    /// cache capacity, or another variant on storage failure.
    fn set(&self, native_key: &str, value: String) -> Result<(), LocalCacheError>;

    /// Delete `native_key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LocalCacheError`] if the backing storage cannot be written.
    fn remove(&self, native_key: &str) -> Result<(), LocalCacheError>;

    /// List stored native keys that start with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Generic remote key/value table addressed by `(key, scope)`.
#[async_trait]
pub trait FallbackStore: Send + Sync {
    async fn get(&self, key: &StorageKey, scope: &UserScope)
        -> Result<Option<Record>, TierError>;

    async fn put(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> Result<(), TierError>;

    async fn delete(&self, key: &StorageKey, scope: &UserScope) -> Result<(), TierError>;

    /// Whether this is a placeholder for "no fallback configured".
    ///
    /// Null stores are skipped by the resolver and reported as such by the
    /// status prober.
    fn is_null(&self) -> bool {
        false
    }
}

/// Entity-specific remote table, registered for exactly one storage key.
///
/// The adapter owns the mapping from its logical key to rows of its table.
#[async_trait]
pub trait DurableAdapter: Send + Sync {
    /// The storage key this adapter serves.
    fn key(&self) -> &StorageKey;

    async fn read(&self, scope: &UserScope) -> Result<Option<Record>, TierError>;

    async fn write(&self, scope: &UserScope, record: &Record) -> Result<(), TierError>;

    /// Delete every row this adapter holds for `scope`.
    ///
    /// Entity tables frequently forbid bulk deletes, so the default refuses.
    async fn delete(&self, _scope: &UserScope) -> Result<(), TierError> {
        Err(TierError::Unsupported)
    }

    /// Whether [`delete`](DurableAdapter::delete) is implemented.
    fn supports_delete(&self) -> bool {
        false
    }
}
