//! Shared wiring for integration tests: in-process tiers with fault switches.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stratum_client::storage::{
    AdapterRegistry, MemoryDurableAdapter, MemoryFallbackStore, MemoryLocalCache,
};
use stratum_client::{
    MigrationConfig, MigrationSweeper, ProbeConfig, ProbeTargets, Resolver, ResolverConfig,
    ResolverDeps, StaticIdentity, StatusProber, SyncStateTracker, TierPolicy,
};
use stratum_core::{KeyRegistry, ManualClock, StorageKey};

pub struct Stack {
    pub identity: Arc<StaticIdentity>,
    pub local: Arc<MemoryLocalCache>,
    pub fallback: Arc<MemoryFallbackStore>,
    pub customers: Arc<MemoryDurableAdapter>,
    pub resolver: Arc<Resolver>,
    pub sweeper: MigrationSweeper,
    pub prober: StatusProber,
}

pub fn key(name: &str) -> StorageKey {
    StorageKey::new(name).unwrap()
}

/// Durable adapter for `customers`, fallback for everything else.
pub fn stack(user: Option<&str>) -> Stack {
    let identity = Arc::new(match user {
        Some(id) => StaticIdentity::signed_in(id),
        None => StaticIdentity::guest(),
    });
    let local = Arc::new(MemoryLocalCache::new());
    let fallback = Arc::new(MemoryFallbackStore::new());
    let customers = Arc::new(MemoryDurableAdapter::new(key("customers")));
    let tracker = Arc::new(SyncStateTracker::new(Arc::new(ManualClock::new(1_000))));

    let resolver = Arc::new(Resolver::new(
        ResolverDeps {
            identity: identity.clone(),
            local: local.clone(),
            fallback: fallback.clone(),
            adapters: Arc::new(AdapterRegistry::new().with(customers.clone())),
            tracker,
        },
        ResolverConfig {
            policy: TierPolicy::PreferDurable,
            remote_timeout: Duration::from_millis(100),
            ..ResolverConfig::default()
        },
    ));

    let keys = KeyRegistry::from_names(["customers", "orders", "claims", "user-settings"]).unwrap();
    let sweeper = MigrationSweeper::new(
        Arc::clone(&resolver),
        Arc::new(keys),
        MigrationConfig::default(),
    );
    let prober = StatusProber::new(
        ProbeTargets::from_resolver(&resolver),
        identity.clone(),
        ProbeConfig {
            timeout: Duration::from_millis(100),
        },
    );

    Stack {
        identity,
        local,
        fallback,
        customers,
        resolver,
        sweeper,
        prober,
    }
}

impl Stack {
    pub fn all_remotes_down(&self) {
        self.customers.faults().make_unreachable();
        self.fallback.faults().make_unreachable();
    }

    pub fn all_remotes_up(&self) {
        self.customers.faults().restore();
        self.fallback.faults().restore();
    }
}
