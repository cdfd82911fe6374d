//! Migration sweeper: copies Local-Cache-only entries into a remote tier.
//!
//! Runs only when explicitly triggered. For each registered key it reads
//! the local entry and writes it to the best reachable remote tier unless
//! that tier already holds an entry for `(key, scope)`. Local data is never
//! deleted, so repeated sweeps are idempotent.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use stratum_core::{KeyRegistry, Record, StorageKey, TierKind, UserScope};
use tracing::{debug, info, warn};

use crate::config::{MigrationConfig, TierPolicy};
use crate::error::MigrationError;
use crate::resolver::{Resolver, TierAttempt};

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated_count: usize,
    /// Keys whose copy failed, in registry order.
    pub failed_keys: Vec<StorageKey>,
    /// Keys with nothing to copy or already present remotely.
    pub skipped_count: usize,
}

impl MigrationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_keys.is_empty()
    }
}

#[derive(Debug)]
enum KeyOutcome {
    Migrated(TierKind),
    NoLocalEntry,
    AlreadyRemote(TierKind),
    Failed(String),
}

/// Copies local entries of every registered key into remote tiers.
pub struct MigrationSweeper {
    resolver: Arc<Resolver>,
    keys: Arc<KeyRegistry>,
    config: MigrationConfig,
}

impl MigrationSweeper {
    #[must_use]
    pub fn new(resolver: Arc<Resolver>, keys: Arc<KeyRegistry>, config: MigrationConfig) -> Self {
        Self {
            resolver,
            keys,
            config,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Sweeps the local entries of `scope`.
    ///
    /// # Errors
    ///
    /// [`MigrationError::Unauthenticated`] for the guest scope and
    /// [`MigrationError::NoRemoteTier`] under a local-only policy. Per-key
    /// failures are reported in [`MigrationReport::failed_keys`].
    pub async fn migrate(&self, scope: &UserScope) -> Result<MigrationReport, MigrationError> {
        self.sweep(scope, false).await
    }

    /// Like [`migrate`](Self::migrate), but keys with no local entry under
    /// `scope` fall back to the guest scope's entry. The guest entry stays
    /// in place.
    ///
    /// # Errors
    ///
    /// See [`migrate`](Self::migrate).
    pub async fn migrate_with_guest(
        &self,
        scope: &UserScope,
    ) -> Result<MigrationReport, MigrationError> {
        self.sweep(scope, true).await
    }

    /// Sweeps the scope of the currently signed-in user, merging guest data.
    ///
    /// # Errors
    ///
    /// [`MigrationError::Unauthenticated`] when nobody is signed in,
    /// [`MigrationError::InvalidScope`] when the reported id is unusable.
    pub async fn migrate_current_user(&self) -> Result<MigrationReport, MigrationError> {
        let scope = self.resolver.scope_for_current_user()?;
        self.migrate_with_guest(&scope).await
    }

    async fn sweep(
        &self,
        scope: &UserScope,
        include_guest: bool,
    ) -> Result<MigrationReport, MigrationError> {
        if !scope.is_authenticated() {
            return Err(MigrationError::Unauthenticated);
        }
        let policy = self.resolver.policy();
        if policy == TierPolicy::LocalOnly {
            return Err(MigrationError::NoRemoteTier {
                policy: policy.as_str(),
            });
        }

        let guard = self.resolver.tracker().begin();
        let outcomes: Vec<(StorageKey, KeyOutcome)> = stream::iter(self.keys.iter().cloned())
            .map(|key| async move {
                let outcome = self.migrate_key(&key, scope, include_guest).await;
                (key, outcome)
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = MigrationReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                KeyOutcome::Migrated(tier) => {
                    info!(key = %key, scope = %scope, tier = %tier, "migrated local entry");
                    metrics::counter!("stratum_migrated_keys_total").increment(1);
                    report.migrated_count += 1;
                }
                KeyOutcome::AlreadyRemote(tier) => {
                    debug!(key = %key, scope = %scope, tier = %tier, "remote entry exists, skipped");
                    report.skipped_count += 1;
                }
                KeyOutcome::NoLocalEntry => report.skipped_count += 1,
                KeyOutcome::Failed(error) => {
                    warn!(key = %key, scope = %scope, error = %error, "migration of key failed");
                    metrics::counter!("stratum_migration_failures_total").increment(1);
                    report.failed_keys.push(key);
                }
            }
        }

        info!(
            scope = %scope,
            migrated = report.migrated_count,
            failed = report.failed_keys.len(),
            skipped = report.skipped_count,
            "migration sweep finished"
        );

        let succeeded = report.migrated_count > 0 || report.failed_keys.is_empty();
        guard.finish(
            succeeded,
            format!("migration failed for {} key(s)", report.failed_keys.len()),
        );
        Ok(report)
    }

    async fn migrate_key(&self, key: &StorageKey, scope: &UserScope, include_guest: bool) -> KeyOutcome {
        let source = match self.local_source(key, scope, include_guest) {
            Ok(Some(record)) => record,
            Ok(None) => return KeyOutcome::NoLocalEntry,
            Err(error) => return KeyOutcome::Failed(error),
        };

        match self.resolver.read_durable(key, scope).await {
            TierAttempt::Ok(_) => return KeyOutcome::AlreadyRemote(TierKind::Durable),
            TierAttempt::NotFound => {
                if self.resolver.write_durable(key, scope, &source).await.is_ok() {
                    return KeyOutcome::Migrated(TierKind::Durable);
                }
            }
            // Durable missing or unreachable: use the fallback table.
            _ => {}
        }

        match self.resolver.read_fallback(key, scope).await {
            TierAttempt::Ok(_) => KeyOutcome::AlreadyRemote(TierKind::Fallback),
            TierAttempt::NotFound => {
                let write = self.resolver.write_fallback(key, scope, &source).await;
                if write.is_ok() {
                    KeyOutcome::Migrated(TierKind::Fallback)
                } else {
                    KeyOutcome::Failed(
                        write
                            .error_message()
                            .unwrap_or_else(|| "fallback write failed".to_string()),
                    )
                }
            }
            TierAttempt::Skipped => KeyOutcome::Failed("no reachable remote tier".to_string()),
            other => KeyOutcome::Failed(
                other
                    .error_message()
                    .unwrap_or_else(|| "fallback read failed".to_string()),
            ),
        }
    }

    fn local_source(
        &self,
        key: &StorageKey,
        scope: &UserScope,
        include_guest: bool,
    ) -> Result<Option<Record>, String> {
        let own = self
            .resolver
            .read_local(key, scope)
            .map_err(|err| err.to_string())?;
        if own.is_some() || !include_guest {
            return Ok(own);
        }
        self.resolver
            .read_local(key, &UserScope::Guest)
            .map_err(|err| err.to_string())
    }
}
