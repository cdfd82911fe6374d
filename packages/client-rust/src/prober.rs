//! Status prober: round-trip health checks for every tier.
//!
//! Each probe writes a disposable value, reads it back, compares the
//! canonical bytes and deletes it again. The delete runs whatever the
//! outcome of the read-back, so a probe never leaves data behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::json;
use stratum_core::{
    native_key, ClockSource, DiagnosticReport, DurableAdapter, FallbackStore, IdentityProvider,
    LocalCache, Record, StorageKey, SystemClock, TierError, TierProbeResult, UserScope,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::resolver::{bounded, Resolver};
use crate::storage::AdapterRegistry;

pub const REC_DURABLE_UNREACHABLE: &str = "remote durable store unreachable: check connectivity";
pub const REC_FALLBACK_UNREACHABLE: &str = "remote fallback store unreachable: check connectivity";
pub const REC_FALLBACK_MISSING: &str = "no remote fallback store configured";
pub const REC_LOCAL_UNAVAILABLE: &str = "local cache unavailable: check storage quota or permissions";
pub const REC_NO_USER: &str = "no authenticated user: migration unavailable";
pub const REC_ALL_HEALTHY: &str = "all tiers healthy";

const SKIPPED_NO_DELETE: &str = "probe skipped: adapter cannot delete";
const SKIPPED_NO_FALLBACK: &str = "no fallback store configured";

/// The tiers a [`StatusProber`] checks.
#[derive(Clone)]
pub struct ProbeTargets {
    /// Native-key prefix used for the local probe entry.
    pub app_prefix: String,
    pub local: Arc<dyn LocalCache>,
    pub fallback: Arc<dyn FallbackStore>,
    pub adapters: Arc<AdapterRegistry>,
}

impl ProbeTargets {
    /// Probes the same tiers the resolver uses.
    #[must_use]
    pub fn from_resolver(resolver: &Resolver) -> Self {
        Self {
            app_prefix: resolver.config().app_prefix.clone(),
            local: Arc::clone(resolver.local_cache()),
            fallback: Arc::clone(resolver.fallback_store()),
            adapters: Arc::clone(resolver.adapters()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeSubject {
    Local,
    Fallback,
    Durable,
}

/// A probe result plus what is needed to derive recommendations.
struct TierProbe {
    subject: ProbeSubject,
    result: TierProbeResult,
}

/// Failed step of a round trip.
#[derive(Debug)]
enum ProbeFailure {
    Write(String),
    Read(String),
    Missing,
    Mismatch,
    Cleanup(String),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(e) => write!(f, "probe write failed: {e}"),
            Self::Read(e) => write!(f, "probe read failed: {e}"),
            Self::Missing => f.write_str("probe value missing on read-back"),
            Self::Mismatch => f.write_str("probe value changed on read-back"),
            Self::Cleanup(e) => write!(f, "probe cleanup failed: {e}"),
        }
    }
}

/// Runs on-demand diagnostics against every tier.
pub struct StatusProber {
    targets: ProbeTargets,
    identity: Arc<dyn IdentityProvider>,
    config: ProbeConfig,
    clock: Arc<dyn ClockSource>,
}

impl StatusProber {
    #[must_use]
    pub fn new(targets: ProbeTargets, identity: Arc<dyn IdentityProvider>, config: ProbeConfig) -> Self {
        Self {
            targets,
            identity,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for report timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Probes every tier and derives recommendations.
    pub async fn probe(&self) -> DiagnosticReport {
        let run_id = Uuid::new_v4();
        let key = StorageKey::probe(&run_id.to_string());
        // Remote probes get their own scope so they never touch user rows.
        let remote_scope = UserScope::User(format!("probe-{run_id}"));
        let payload = Record::new(json!({ "probe": run_id.to_string(), "at": self.clock.now() }));

        let mut probes = vec![self.probe_local(&key, &payload)];

        let durable = self
            .targets
            .adapters
            .iter()
            .map(|(_, adapter)| self.probe_durable(Arc::clone(adapter), &remote_scope, &payload));
        let (fallback, durable) = tokio::join!(
            self.probe_fallback(&key, &remote_scope, &payload),
            join_all(durable)
        );
        probes.push(fallback);
        probes.extend(durable);

        let current_user_id = self.identity.current_user_id().filter(|id| !id.is_empty());
        let recommendations = recommendations(&probes, current_user_id.is_some());
        let report = DiagnosticReport {
            tier_results: probes.into_iter().map(|p| p.result).collect(),
            current_user_id,
            recommendations,
            timestamp: self.clock.now(),
        };

        info!(
            tiers = report.tier_results.len(),
            all_reachable = report.all_reachable(),
            "status probe finished"
        );
        report
    }

    fn probe_local(&self, key: &StorageKey, payload: &Record) -> TierProbe {
        let native = native_key(&self.targets.app_prefix, key, &UserScope::Guest);
        let expected = payload.to_canonical_string();
        let local = &self.targets.local;
        let start = Instant::now();

        let mut outcome = local
            .set(&native, expected.clone())
            .map_err(|e| ProbeFailure::Write(e.to_string()))
            .and_then(|()| match local.get(&native) {
                Ok(Some(raw)) if raw == expected => Ok(()),
                Ok(Some(_)) => Err(ProbeFailure::Mismatch),
                Ok(None) => Err(ProbeFailure::Missing),
                Err(e) => Err(ProbeFailure::Read(e.to_string())),
            });
        if let Err(e) = local.remove(&native) {
            outcome = outcome.and(Err(ProbeFailure::Cleanup(e.to_string())));
        }

        finish("local", ProbeSubject::Local, start.elapsed(), outcome)
    }

    async fn probe_fallback(&self, key: &StorageKey, scope: &UserScope, payload: &Record) -> TierProbe {
        let fallback = &self.targets.fallback;
        if fallback.is_null() {
            return skipped("fallback", ProbeSubject::Fallback, SKIPPED_NO_FALLBACK);
        }
        let timeout = self.config.timeout;
        let start = Instant::now();

        let write = bounded(timeout, fallback.put(key, scope, payload)).await;
        let mut outcome = match write {
            Ok(()) => compare(bounded(timeout, fallback.get(key, scope)).await, payload),
            Err(e) => Err(ProbeFailure::Write(e.to_string())),
        };
        if let Err(e) = bounded(timeout, fallback.delete(key, scope)).await {
            warn!(key = %key, error = %e, "fallback probe cleanup failed");
            if outcome.is_ok() {
                outcome = Err(ProbeFailure::Cleanup(e.to_string()));
            }
        }

        finish("fallback", ProbeSubject::Fallback, start.elapsed(), outcome)
    }

    async fn probe_durable(
        &self,
        adapter: Arc<dyn DurableAdapter>,
        scope: &UserScope,
        payload: &Record,
    ) -> TierProbe {
        let name = format!("durable:{}", adapter.key());
        if !adapter.supports_delete() {
            return skipped(&name, ProbeSubject::Durable, SKIPPED_NO_DELETE);
        }
        let timeout = self.config.timeout;
        let start = Instant::now();

        let write = bounded(timeout, adapter.write(scope, payload)).await;
        let mut outcome = match write {
            Ok(()) => compare(bounded(timeout, adapter.read(scope)).await, payload),
            Err(e) => Err(ProbeFailure::Write(e.to_string())),
        };
        if let Err(e) = bounded(timeout, adapter.delete(scope)).await {
            warn!(adapter = %adapter.key(), error = %e, "durable probe cleanup failed");
            if outcome.is_ok() {
                outcome = Err(ProbeFailure::Cleanup(e.to_string()));
            }
        }

        finish(&name, ProbeSubject::Durable, start.elapsed(), outcome)
    }
}

fn compare(read: Result<Option<Record>, TierError>, expected: &Record) -> Result<(), ProbeFailure> {
    match read {
        Ok(Some(found)) if found.to_canonical_string() == expected.to_canonical_string() => Ok(()),
        Ok(Some(_)) => Err(ProbeFailure::Mismatch),
        Ok(None) => Err(ProbeFailure::Missing),
        Err(e) => Err(ProbeFailure::Read(e.to_string())),
    }
}

fn finish(
    name: &str,
    subject: ProbeSubject,
    elapsed: Duration,
    outcome: Result<(), ProbeFailure>,
) -> TierProbe {
    TierProbe {
        subject,
        result: TierProbeResult {
            name: name.to_string(),
            reachable: outcome.is_ok(),
            skipped: false,
            latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error: outcome.err().map(|e| e.to_string()),
        },
    }
}

fn skipped(name: &str, subject: ProbeSubject, reason: &str) -> TierProbe {
    TierProbe {
        subject,
        result: TierProbeResult {
            name: name.to_string(),
            reachable: false,
            skipped: true,
            latency_ms: 0,
            error: Some(reason.to_string()),
        },
    }
}

fn recommendations(probes: &[TierProbe], authenticated: bool) -> Vec<String> {
    let failed = |subject: ProbeSubject| {
        probes
            .iter()
            .any(|p| p.subject == subject && !p.result.skipped && !p.result.reachable)
    };

    let mut recs = Vec::new();
    if failed(ProbeSubject::Durable) {
        recs.push(REC_DURABLE_UNREACHABLE);
    }
    if failed(ProbeSubject::Fallback) {
        recs.push(REC_FALLBACK_UNREACHABLE);
    }
    if probes
        .iter()
        .any(|p| p.subject == ProbeSubject::Fallback && p.result.skipped)
    {
        recs.push(REC_FALLBACK_MISSING);
    }
    if failed(ProbeSubject::Local) {
        recs.push(REC_LOCAL_UNAVAILABLE);
    }
    if !authenticated {
        recs.push(REC_NO_USER);
    }
    if recs.is_empty() {
        recs.push(REC_ALL_HEALTHY);
    }
    recs.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use stratum_core::ManualClock;

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::storage::{
        Fault, FaultOp, MemoryDurableAdapter, MemoryFallbackStore, MemoryLocalCache,
        NullFallbackStore,
    };

    struct Harness {
        prober: StatusProber,
        local: Arc<MemoryLocalCache>,
        fallback: Arc<MemoryFallbackStore>,
        customers: Arc<MemoryDurableAdapter>,
        identity: Arc<StaticIdentity>,
    }

    fn harness() -> Harness {
        let local = Arc::new(MemoryLocalCache::new());
        let fallback = Arc::new(MemoryFallbackStore::new());
        let customers = Arc::new(MemoryDurableAdapter::new(StorageKey::new("customers").unwrap()));
        let identity = Arc::new(StaticIdentity::signed_in("user-42"));
        let targets = ProbeTargets {
            app_prefix: "stratum".to_string(),
            local: local.clone(),
            fallback: fallback.clone(),
            adapters: Arc::new(AdapterRegistry::new().with(customers.clone())),
        };
        let prober = StatusProber::new(
            targets,
            identity.clone(),
            ProbeConfig {
                timeout: Duration::from_millis(50),
            },
        )
        .with_clock(Arc::new(ManualClock::new(1_700_000_000_000)));
        Harness {
            prober,
            local,
            fallback,
            customers,
            identity,
        }
    }

    #[tokio::test]
    async fn healthy_tiers_report_all_healthy() {
        let h = harness();
        let report = h.prober.probe().await;

        assert!(report.all_reachable());
        assert_eq!(report.tier_results.len(), 3);
        assert!(report.tier("local").is_some());
        assert!(report.tier("fallback").is_some());
        assert!(report.tier("durable:customers").is_some());
        assert_eq!(report.current_user_id.as_deref(), Some("user-42"));
        assert_eq!(report.recommendations, vec![REC_ALL_HEALTHY.to_string()]);
        assert_eq!(report.timestamp, 1_700_000_000_000);

        assert!(h.local.is_empty());
        assert!(h.fallback.is_empty());
        assert!(h.customers.is_empty());
    }

    #[tokio::test]
    async fn failed_read_back_still_cleans_up() {
        let h = harness();
        h.fallback.faults().set(FaultOp::Read, Some(Fault::Corrupt));
        h.customers.faults().set(FaultOp::Read, Some(Fault::Unreachable));

        let report = h.prober.probe().await;

        let fallback = report.tier("fallback").unwrap();
        assert!(!fallback.reachable);
        assert!(fallback.error.as_deref().unwrap().contains("changed"));
        assert!(!report.tier("durable:customers").unwrap().reachable);
        assert!(report.recommendations.contains(&REC_DURABLE_UNREACHABLE.to_string()));
        assert!(report.recommendations.contains(&REC_FALLBACK_UNREACHABLE.to_string()));

        assert!(h.fallback.is_empty());
        assert!(h.customers.is_empty());
        assert!(h.local.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_tier_is_reported_unreachable() {
        let h = harness();
        h.fallback.faults().set_all(Fault::Hang(Duration::from_secs(30)));

        let report = h.prober.probe().await;
        let fallback = report.tier("fallback").unwrap();
        assert!(!fallback.reachable);
        assert!(fallback.error.as_deref().unwrap().contains("timed out"));
        assert!(report.tier("local").unwrap().reachable);
        assert!(h.fallback.is_empty());
    }

    #[tokio::test]
    async fn guest_session_recommends_sign_in() {
        let h = harness();
        h.identity.sign_out();
        let report = h.prober.probe().await;
        assert!(report.current_user_id.is_none());
        assert_eq!(report.recommendations, vec![REC_NO_USER.to_string()]);
    }

    #[tokio::test]
    async fn full_local_cache_is_reported() {
        let local = Arc::new(MemoryLocalCache::with_quota(8));
        let prober = StatusProber::new(
            ProbeTargets {
                app_prefix: "stratum".to_string(),
                local: local.clone(),
                fallback: Arc::new(NullFallbackStore),
                adapters: Arc::new(AdapterRegistry::new()),
            },
            Arc::new(StaticIdentity::signed_in("u1")),
            ProbeConfig::default(),
        );

        let report = prober.probe().await;
        assert!(!report.tier("local").unwrap().reachable);
        assert!(report.recommendations.contains(&REC_LOCAL_UNAVAILABLE.to_string()));
        assert!(report.recommendations.contains(&REC_FALLBACK_MISSING.to_string()));
        assert!(local.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_fallback_is_skipped_not_failed() {
        let prober = StatusProber::new(
            ProbeTargets {
                app_prefix: "stratum".to_string(),
                local: Arc::new(MemoryLocalCache::new()),
                fallback: Arc::new(NullFallbackStore),
                adapters: Arc::new(AdapterRegistry::new()),
            },
            Arc::new(StaticIdentity::signed_in("u1")),
            ProbeConfig::default(),
        );

        let report = prober.probe().await;
        let fallback = report.tier("fallback").unwrap();
        assert!(fallback.skipped);
        assert!(!fallback.reachable);
        assert!(report.all_reachable());
        assert_eq!(report.recommendations, vec![REC_FALLBACK_MISSING.to_string()]);
    }

    #[tokio::test]
    async fn append_only_adapter_is_not_written() {
        let adapter = Arc::new(
            MemoryDurableAdapter::new(StorageKey::new("claims").unwrap()).without_delete(),
        );
        let prober = StatusProber::new(
            ProbeTargets {
                app_prefix: "stratum".to_string(),
                local: Arc::new(MemoryLocalCache::new()),
                fallback: Arc::new(MemoryFallbackStore::new()),
                adapters: Arc::new(AdapterRegistry::new().with(adapter.clone())),
            },
            Arc::new(StaticIdentity::signed_in("u1")),
            ProbeConfig::default(),
        );

        let report = prober.probe().await;
        let claims = report.tier("durable:claims").unwrap();
        assert!(!claims.reachable);
        assert!(claims.skipped);
        assert_eq!(claims.error.as_deref(), Some(SKIPPED_NO_DELETE));
        assert!(!report.recommendations.contains(&REC_DURABLE_UNREACHABLE.to_string()));
        assert_eq!(report.recommendations, vec![REC_ALL_HEALTHY.to_string()]);
        assert!(report.all_reachable());
        assert!(adapter.is_empty());
    }
}
