//! Persistence resolver: routes reads and writes across the three tiers.
//!
//! Reads walk the tiers in [`TierPolicy`] order and return the first hit.
//! Writes always land in the Local Cache and in the best reachable remote
//! tier. Remote failures degrade to the next tier and are reported through
//! result flags and the [`SyncStateTracker`], never as errors.

mod attempt;

pub use attempt::{bounded, TierAttempt};

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stratum_core::{
    native_key, DurableAdapter, FallbackStore, IdentityProvider, LocalCache, LocalCacheError,
    Record, ScopeError, StorageKey, TierKind, UserScope,
};
use tracing::{debug, warn};

use crate::config::{ResolverConfig, TierPolicy};
use crate::error::ResolverError;
use crate::storage::AdapterRegistry;
use crate::sync_state::SyncStateTracker;
use attempt::AttemptContext;

/// Outcome flags of a successful [`Resolver::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOutcome {
    /// A remote tier accepted the value.
    pub remote: bool,
    /// The Local Cache accepted the value.
    pub local: bool,
    /// Which remote tier accepted the value, if any.
    pub remote_tier: Option<TierKind>,
}

/// Outcome flags of a successful [`Resolver::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveOutcome {
    pub local: bool,
    pub fallback: bool,
    pub durable: bool,
}

/// Collaborators injected into a [`Resolver`].
pub struct ResolverDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub local: Arc<dyn LocalCache>,
    pub fallback: Arc<dyn FallbackStore>,
    pub adapters: Arc<AdapterRegistry>,
    pub tracker: Arc<SyncStateTracker>,
}

/// Reads and writes application records across the durable, fallback and
/// local tiers.
pub struct Resolver {
    identity: Arc<dyn IdentityProvider>,
    local: Arc<dyn LocalCache>,
    fallback: Arc<dyn FallbackStore>,
    adapters: Arc<AdapterRegistry>,
    tracker: Arc<SyncStateTracker>,
    config: ResolverConfig,
    /// Per native key, bumped by every `set` and `remove`. A remote hit only
    /// refreshes the Local Cache if no write started since the read began.
    write_generations: DashMap<String, u64>,
}

impl Resolver {
    #[must_use]
    pub fn new(deps: ResolverDeps, config: ResolverConfig) -> Self {
        Self {
            identity: deps.identity,
            local: deps.local,
            fallback: deps.fallback,
            adapters: deps.adapters,
            tracker: deps.tracker,
            config,
            write_generations: DashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn policy(&self) -> TierPolicy {
        self.config.policy
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<SyncStateTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    #[must_use]
    pub fn local_cache(&self) -> &Arc<dyn LocalCache> {
        &self.local
    }

    #[must_use]
    pub fn fallback_store(&self) -> &Arc<dyn FallbackStore> {
        &self.fallback
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Scope of the user the identity provider currently reports.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] when the reported id cannot be a scope.
    pub fn scope_for_current_user(&self) -> Result<UserScope, ScopeError> {
        UserScope::from_user_id(self.identity.current_user_id())
    }

    /// Local Cache key for `(key, scope)`.
    #[must_use]
    pub fn native_key(&self, key: &StorageKey, scope: &UserScope) -> String {
        native_key(&self.config.app_prefix, key, scope)
    }

    // -- read path --------------------------------------------------------

    /// Returns the record stored under `(key, scope)` in the first tier that
    /// has one.
    ///
    /// # Errors
    ///
    /// Fails only when the local read itself errors and no remote tier hit.
    pub async fn get(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<Option<Record>, ResolverError> {
        let mut local_error = None;
        let native = self.native_key(key, scope);
        let generation = self.write_generation(&native);

        for tier in self.read_order() {
            let hit = match tier {
                TierKind::Local => match self.read_local(key, scope) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(key = %key, scope = %scope, error = %err, "local cache read failed");
                        local_error = Some(err);
                        None
                    }
                },
                TierKind::Durable => self.read_durable(key, scope).await.ok(),
                TierKind::Fallback => self.read_fallback(key, scope).await.ok(),
            };

            if let Some(record) = hit {
                if tier.is_remote() {
                    self.refresh_local(&native, generation, &record);
                }
                return Ok(Some(record));
            }
        }

        match local_error {
            Some(err) => Err(ResolverError::local(err, false)),
            None => Ok(None),
        }
    }

    /// [`get`](Resolver::get) decoded into `T`.
    ///
    /// # Errors
    ///
    /// As [`get`](Resolver::get), plus [`ResolverError::Serialization`] when
    /// the stored record does not decode as `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<Option<T>, ResolverError> {
        match self.get(key, scope).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    fn read_order(&self) -> &'static [TierKind] {
        match self.config.policy {
            TierPolicy::PreferDurable => &[TierKind::Durable, TierKind::Fallback, TierKind::Local],
            TierPolicy::FallbackOnly => &[TierKind::Fallback, TierKind::Local],
            TierPolicy::LocalFirst => &[TierKind::Local, TierKind::Durable, TierKind::Fallback],
            TierPolicy::LocalOnly => &[TierKind::Local],
        }
    }

    /// Reads the Local Cache entry. Undecodable entries read as a miss.
    pub(crate) fn read_local(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<Option<Record>, LocalCacheError> {
        let Some(raw) = self.local.get(&self.native_key(key, scope))? else {
            return Ok(None);
        };
        match Record::from_canonical_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key = %key, scope = %scope, error = %err, "discarding corrupt local entry");
                Ok(None)
            }
        }
    }

    fn durable_adapter(&self, key: &StorageKey, scope: &UserScope) -> Option<Arc<dyn DurableAdapter>> {
        if !self.config.policy.uses_durable() || !scope.is_authenticated() {
            return None;
        }
        self.adapters.get(key)
    }

    fn fallback_enabled(&self, scope: &UserScope) -> bool {
        self.config.policy.uses_remote() && scope.is_authenticated() && !self.fallback.is_null()
    }

    pub(crate) async fn read_durable(&self, key: &StorageKey, scope: &UserScope) -> TierAttempt<Record> {
        let Some(adapter) = self.durable_adapter(key, scope) else {
            return TierAttempt::Skipped;
        };
        let ctx = AttemptContext {
            tier: TierKind::Durable,
            op: "get",
            key,
            scope,
        };
        attempt::attempt(ctx, self.config.remote_timeout, adapter.read(scope))
            .await
            .flatten_read()
    }

    pub(crate) async fn read_fallback(&self, key: &StorageKey, scope: &UserScope) -> TierAttempt<Record> {
        if !self.fallback_enabled(scope) {
            return TierAttempt::Skipped;
        }
        let ctx = AttemptContext {
            tier: TierKind::Fallback,
            op: "get",
            key,
            scope,
        };
        attempt::attempt(ctx, self.config.remote_timeout, self.fallback.get(key, scope))
            .await
            .flatten_read()
    }

    fn write_generation(&self, native: &str) -> u64 {
        self.write_generations.get(native).map_or(0, |generation| *generation)
    }

    fn bump_write_generation(&self, native: &str) {
        *self.write_generations.entry(native.to_owned()).or_insert(0) += 1;
    }

    /// Copies a remote hit into the Local Cache unless a write to the same
    /// native key started after the read. The entry lock is held across the
    /// local write so a concurrent `set` cannot slip in between.
    fn refresh_local(&self, native: &str, read_generation: u64, record: &Record) {
        if !self.config.refresh_local_on_remote_hit {
            return;
        }
        let current = self.write_generations.entry(native.to_owned()).or_insert(0);
        if *current != read_generation {
            debug!(native_key = %native, "newer local write, refresh dropped");
            return;
        }
        if let Err(err) = self.local.set(native, record.to_canonical_string()) {
            debug!(native_key = %native, error = %err, "local refresh after remote hit failed");
        }
    }

    // -- write path -------------------------------------------------------

    /// Serialises `value` and writes it to the Local Cache and the best
    /// reachable remote tier.
    ///
    /// # Errors
    ///
    /// [`ResolverError::Serialization`] when `value` cannot be encoded (no
    /// tier is touched), or a local-cache error once the remote outcome is
    /// known.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        value: &T,
    ) -> Result<SetOutcome, ResolverError> {
        let record = Record::from_serialize(value)?;
        self.set_record(key, scope, &record).await
    }

    /// Writes an already-encoded record. See [`set`](Resolver::set).
    ///
    /// # Errors
    ///
    /// Returns a local-cache error once the remote outcome is known.
    pub async fn set_record(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> Result<SetOutcome, ResolverError> {
        let guard = self.tracker.begin();
        let native = self.native_key(key, scope);
        self.bump_write_generation(&native);
        let encoded = record.to_canonical_string();

        let local_write = async { self.local.set(&native, encoded) };
        let (local, remote_tier) = tokio::join!(local_write, self.write_remote(key, scope, record));

        let remote = remote_tier.is_some();
        match local {
            Ok(()) => {
                guard.succeed();
                Ok(SetOutcome {
                    remote,
                    local: true,
                    remote_tier,
                })
            }
            Err(err) => {
                warn!(key = %key, scope = %scope, error = %err, remote, "local cache write failed");
                guard.finish(remote, format!("local write of {key} failed: {err}"));
                Err(ResolverError::local(err, remote))
            }
        }
    }

    /// Writes to durable if possible, otherwise fallback. Returns the tier
    /// that accepted the record.
    pub(crate) async fn write_remote(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> Option<TierKind> {
        if !self.config.policy.uses_remote() {
            return None;
        }
        if !scope.is_authenticated() {
            debug!(key = %key, "guest scope, remote write skipped");
            return None;
        }

        if self.write_durable(key, scope, record).await.is_ok() {
            return Some(TierKind::Durable);
        }
        let fallback = self.write_fallback(key, scope, record).await;
        if fallback.is_ok() {
            return Some(TierKind::Fallback);
        }
        if !matches!(fallback, TierAttempt::Skipped) {
            warn!(
                key = %key,
                scope = %scope,
                error = fallback.error_message().as_deref().unwrap_or(""),
                "remote write degraded, value kept locally"
            );
        }
        None
    }

    pub(crate) async fn write_durable(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> TierAttempt<()> {
        let Some(adapter) = self.durable_adapter(key, scope) else {
            return TierAttempt::Skipped;
        };
        let ctx = AttemptContext {
            tier: TierKind::Durable,
            op: "set",
            key,
            scope,
        };
        attempt::attempt(ctx, self.config.remote_timeout, adapter.write(scope, record)).await
    }

    pub(crate) async fn write_fallback(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        record: &Record,
    ) -> TierAttempt<()> {
        if !self.fallback_enabled(scope) {
            return TierAttempt::Skipped;
        }
        let ctx = AttemptContext {
            tier: TierKind::Fallback,
            op: "set",
            key,
            scope,
        };
        attempt::attempt(
            ctx,
            self.config.remote_timeout,
            self.fallback.put(key, scope, record),
        )
        .await
    }

    // -- remove -----------------------------------------------------------

    /// Deletes `(key, scope)` locally and, best-effort, from both remote
    /// tiers.
    ///
    /// # Errors
    ///
    /// Returns a local-cache error when the local delete fails.
    pub async fn remove(
        &self,
        key: &StorageKey,
        scope: &UserScope,
    ) -> Result<RemoveOutcome, ResolverError> {
        let guard = self.tracker.begin();
        let native = self.native_key(key, scope);
        self.bump_write_generation(&native);

        let local_delete = async { self.local.remove(&native) };
        let (local, fallback, durable) = tokio::join!(
            local_delete,
            self.delete_fallback(key, scope),
            self.delete_durable(key, scope),
        );

        let outcome = RemoveOutcome {
            local: local.is_ok(),
            fallback: fallback.is_ok(),
            durable: durable.is_ok(),
        };
        let remote = outcome.fallback || outcome.durable;

        match local {
            Ok(()) => {
                guard.succeed();
                Ok(outcome)
            }
            Err(err) => {
                warn!(key = %key, scope = %scope, error = %err, "local cache delete failed");
                guard.finish(remote, format!("local delete of {key} failed: {err}"));
                Err(ResolverError::local(err, remote))
            }
        }
    }

    async fn delete_fallback(&self, key: &StorageKey, scope: &UserScope) -> TierAttempt<()> {
        if !self.fallback_enabled(scope) {
            return TierAttempt::Skipped;
        }
        let ctx = AttemptContext {
            tier: TierKind::Fallback,
            op: "remove",
            key,
            scope,
        };
        attempt::attempt(ctx, self.config.remote_timeout, self.fallback.delete(key, scope)).await
    }

    async fn delete_durable(&self, key: &StorageKey, scope: &UserScope) -> TierAttempt<()> {
        let Some(adapter) = self.durable_adapter(key, scope) else {
            return TierAttempt::Skipped;
        };
        if !adapter.supports_delete() {
            return TierAttempt::Skipped;
        }
        let ctx = AttemptContext {
            tier: TierKind::Durable,
            op: "remove",
            key,
            scope,
        };
        attempt::attempt(ctx, self.config.remote_timeout, adapter.delete(scope)).await
    }
}
