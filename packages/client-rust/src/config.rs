//! Configuration for the resolver, migration sweeper, and status prober.

use std::str::FromStr;
use std::time::Duration;

/// Default bound on every remote-tier call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which tiers the resolver consults, and in what order.
///
/// Chosen once at construction; callers opt into degraded modes explicitly
/// instead of toggling behaviour per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierPolicy {
    /// Read durable, then fallback, then local. Write local plus the best
    /// reachable remote tier.
    #[default]
    PreferDurable,
    /// Ignore durable adapters entirely.
    FallbackOnly,
    /// Read local first and go remote only on a local miss.
    LocalFirst,
    /// Never touch a remote tier.
    LocalOnly,
}

impl TierPolicy {
    #[must_use]
    pub fn uses_durable(self) -> bool {
        matches!(self, Self::PreferDurable | Self::LocalFirst)
    }

    #[must_use]
    pub fn uses_remote(self) -> bool {
        !matches!(self, Self::LocalOnly)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreferDurable => "prefer-durable",
            Self::FallbackOnly => "fallback-only",
            Self::LocalFirst => "local-first",
            Self::LocalOnly => "local-only",
        }
    }
}

impl FromStr for TierPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefer-durable" => Ok(Self::PreferDurable),
            "fallback-only" => Ok(Self::FallbackOnly),
            "local-first" => Ok(Self::LocalFirst),
            "local-only" => Ok(Self::LocalOnly),
            other => Err(format!("unknown tier policy: {other}")),
        }
    }
}

/// Resolver-level configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Prefix of every native key in the Local Cache.
    pub app_prefix: String,
    pub policy: TierPolicy,
    /// Upper bound for each remote-tier call. On expiry the tier is treated
    /// as unreachable for that call.
    pub remote_timeout: Duration,
    /// Refresh the Local Cache in the background after a remote read hit.
    pub refresh_local_on_remote_hit: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            app_prefix: "stratum".to_string(),
            policy: TierPolicy::default(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            refresh_local_on_remote_hit: true,
        }
    }
}

/// Migration sweep configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Maximum number of keys migrated concurrently. Values below 1 are
    /// treated as 1.
    pub max_concurrency: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Status prober configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Bound on each remote step of a probe round trip.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}
