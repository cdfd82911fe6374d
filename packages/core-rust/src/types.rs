//! Shared vocabulary of the tiers: tier kinds, sync status and the
//! diagnostic report.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/// One of the three storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// Entity-specific remote tables.
    Durable,
    /// Generic remote key/value table.
    Fallback,
    /// Client-resident cache.
    Local,
}

impl TierKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Fallback => "fallback",
            Self::Local => "local",
        }
    }

    #[must_use]
    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable synchronisation state.
///
/// State machine: Idle -> Syncing -> (Idle | Error), Error -> Syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

/// Snapshot of the sync state consumed by status UIs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    /// Millis since epoch of the last operation that reached any tier.
    pub last_synced_at: Option<u64>,
    /// Message of the most recent all-tiers failure while in `Error`.
    pub last_error: Option<String>,
}

/// Outcome of one tier's probe round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierProbeResult {
    /// Tier name, e.g. `"local"`, `"fallback"`, `"durable:customers"`.
    pub name: String,
    pub reachable: bool,
    /// The tier was deliberately not exercised; `reachable` says nothing.
    #[serde(default)]
    pub skipped: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health report produced by the status prober.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub tier_results: Vec<TierProbeResult>,
    pub current_user_id: Option<String>,
    pub recommendations: Vec<String>,
    /// Millis since epoch when the probe finished.
    pub timestamp: u64,
}

impl DiagnosticReport {
    /// Whether every exercised tier completed its round trip. Skipped tiers
    /// are not counted.
    #[must_use]
    pub fn all_reachable(&self) -> bool {
        self.tier_results.iter().all(|t| t.reachable || t.skipped)
    }

    /// Looks up a tier result by name.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&TierProbeResult> {
        self.tier_results.iter().find(|t| t.name == name)
    }

    /// Human-readable rendering for operational tooling.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Storage diagnostics @ {}", self.timestamp);
        let _ = writeln!(
            out,
            "User: {}",
            self.current_user_id.as_deref().unwrap_or("(guest)")
        );
        for tier in &self.tier_results {
            let status = match (tier.skipped, tier.reachable) {
                (true, _) => "SKIP",
                (false, true) => "OK  ",
                (false, false) => "FAIL",
            };
            let _ = write!(out, "  [{status}] {:<24} {:>6}ms", tier.name, tier.latency_ms);
            if let Some(err) = &tier.error {
                let _ = write!(out, "  {err}");
            }
            out.push('\n');
        }
        if !self.recommendations.is_empty() {
            out.push_str("Recommendations:\n");
            for rec in &self.recommendations {
                let _ = writeln!(out, "  - {rec}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> DiagnosticReport {
        DiagnosticReport {
            tier_results: vec![
                TierProbeResult {
                    name: "local".into(),
                    reachable: true,
                    skipped: false,
                    latency_ms: 0,
                    error: None,
                },
                TierProbeResult {
                    name: "fallback".into(),
                    reachable: false,
                    skipped: false,
                    latency_ms: 5000,
                    error: Some("remote call timed out after 5000ms".into()),
                },
            ],
            current_user_id: None,
            recommendations: vec!["no authenticated user: migration unavailable".into()],
            timestamp: 42,
        }
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["tierResults"][0]["name"], "local");
        assert_eq!(json["tierResults"][1]["latencyMs"], 5000);
        assert!(json["tierResults"][0].get("error").is_none());
        assert!(json["currentUserId"].is_null());
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn render_text_lists_tiers_and_recommendations() {
        let report = sample_report();
        assert!(!report.all_reachable());
        assert!(report.tier("fallback").is_some());
        let text = report.render_text();
        assert!(text.contains("User: (guest)"));
        assert!(text.contains("[FAIL] fallback"));
        assert!(text.contains("- no authenticated user"));
    }

    #[test]
    fn skipped_tiers_do_not_count_as_unreachable() {
        let mut report = sample_report();
        report.tier_results[1] = TierProbeResult {
            name: "durable:audit".into(),
            reachable: false,
            skipped: true,
            latency_ms: 0,
            error: Some("adapter cannot delete".into()),
        };
        assert!(report.all_reachable());
        assert!(report.render_text().contains("[SKIP] durable:audit"));
        assert_eq!(serde_json::to_value(&report).unwrap()["tierResults"][1]["skipped"], true);
    }

    #[test]
    fn sync_status_defaults_to_idle() {
        let status = SyncStatus::default();
        assert_eq!(status.state, SyncState::Idle);
        assert!(status.last_synced_at.is_none());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(json["lastSyncedAt"].is_null());
    }

    #[test]
    fn tier_kind_names() {
        assert_eq!(TierKind::Durable.to_string(), "durable");
        assert!(TierKind::Fallback.is_remote());
        assert!(!TierKind::Local.is_remote());
    }
}
