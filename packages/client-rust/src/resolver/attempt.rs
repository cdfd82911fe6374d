//! Tagged outcome of a single tier access, with timeout enforcement.
//!
//! Every remote call goes through [`bounded`], which applies the configured
//! timeout and reports it as [`TierError::Timeout`]. The result is then
//! classified into a [`TierAttempt`] so the resolver can fold outcomes with
//! one policy function instead of matching on error messages.

use std::future::Future;
use std::time::{Duration, Instant};

use stratum_core::{StorageKey, TierError, TierKind, UserScope};
use tracing::debug;

/// Outcome of one tier access.
#[derive(Debug, Clone, PartialEq)]
pub enum TierAttempt<T> {
    /// The tier answered with a value (or acknowledged a write).
    Ok(T),
    /// The tier answered and has nothing under this key.
    NotFound,
    /// Unreachable or timed out. The tier is down for this call only.
    Network(String),
    /// The tier needs an authenticated scope.
    AuthRequired,
    /// The tier answered with an error that is not about reachability.
    Failed(String),
    /// The tier was not consulted (policy, unauthenticated scope, no adapter).
    Skipped,
}

impl<T> TierAttempt<T> {
    /// Classifies a tier error.
    #[must_use]
    pub fn from_error(err: &TierError) -> Self {
        match err {
            TierError::Network(_) | TierError::Timeout { .. } => Self::Network(err.to_string()),
            TierError::AuthRequired => Self::AuthRequired,
            TierError::Unsupported => Self::Skipped,
            TierError::Rejected { .. } | TierError::Decode(_) | TierError::Other(_) => {
                Self::Failed(err.to_string())
            }
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Whether the tier answered, with or without a value.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Ok(_) | Self::NotFound)
    }

    /// Label used for log fields and metrics.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::NotFound => "not_found",
            Self::Network(_) => "network",
            Self::AuthRequired => "auth_required",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Error text for non-successful attempts.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Network(msg) | Self::Failed(msg) => Some(msg.clone()),
            Self::AuthRequired => Some("authentication required".to_string()),
            Self::Ok(_) | Self::NotFound | Self::Skipped => None,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> TierAttempt<Option<T>> {
    /// Lifts a read result: `Ok(None)` becomes [`TierAttempt::NotFound`].
    #[must_use]
    pub fn flatten_read(self) -> TierAttempt<T> {
        match self {
            Self::Ok(Some(v)) => TierAttempt::Ok(v),
            Self::Ok(None) | Self::NotFound => TierAttempt::NotFound,
            Self::Network(m) => TierAttempt::Network(m),
            Self::AuthRequired => TierAttempt::AuthRequired,
            Self::Failed(m) => TierAttempt::Failed(m),
            Self::Skipped => TierAttempt::Skipped,
        }
    }
}

/// Runs a remote call under `timeout`.
///
/// # Errors
///
/// Returns the call's own error, or [`TierError::Timeout`] when the
/// deadline passes first.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, TierError>
where
    F: Future<Output = Result<T, TierError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(TierError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Identifies the call being attempted, for logs and metrics.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    pub tier: TierKind,
    pub op: &'static str,
    pub key: &'a StorageKey,
    pub scope: &'a UserScope,
}

/// Runs a bounded remote call and classifies the result.
pub async fn attempt<T, F>(ctx: AttemptContext<'_>, timeout: Duration, fut: F) -> TierAttempt<T>
where
    F: Future<Output = Result<T, TierError>>,
{
    let start = Instant::now();
    let result = bounded(timeout, fut).await;
    let attempt = match result {
        Ok(value) => TierAttempt::Ok(value),
        Err(err) => TierAttempt::from_error(&err),
    };
    record(ctx, &attempt, start.elapsed());
    attempt
}

fn record<T>(ctx: AttemptContext<'_>, attempt: &TierAttempt<T>, elapsed: Duration) {
    let outcome = attempt.outcome();
    #[allow(clippy::cast_precision_loss)]
    let latency_ms = elapsed.as_secs_f64() * 1000.0;

    metrics::counter!(
        "stratum_tier_attempts_total",
        "tier" => ctx.tier.as_str(),
        "op" => ctx.op,
        "outcome" => outcome,
    )
    .increment(1);
    metrics::histogram!("stratum_tier_latency_ms", "tier" => ctx.tier.as_str())
        .record(latency_ms);

    debug!(
        tier = %ctx.tier,
        op = ctx.op,
        key = %ctx.key,
        scope = %ctx.scope,
        outcome,
        latency_ms,
        error = attempt.error_message().as_deref().unwrap_or(""),
        "tier attempt"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_taxonomy() {
        let network: TierAttempt<()> =
            TierAttempt::from_error(&TierError::Network("refused".into()));
        assert_eq!(network.outcome(), "network");

        let timeout: TierAttempt<()> = TierAttempt::from_error(&TierError::Timeout { timeout_ms: 5 });
        assert!(matches!(timeout, TierAttempt::Network(_)));

        let auth: TierAttempt<()> = TierAttempt::from_error(&TierError::AuthRequired);
        assert_eq!(auth, TierAttempt::AuthRequired);

        let unsupported: TierAttempt<()> = TierAttempt::from_error(&TierError::Unsupported);
        assert_eq!(unsupported, TierAttempt::Skipped);

        let rejected: TierAttempt<()> = TierAttempt::from_error(&TierError::Rejected {
            status: 400,
            message: "bad".into(),
        });
        assert!(matches!(rejected, TierAttempt::Failed(_)));
        assert!(!rejected.is_reachable());
    }

    #[test]
    fn flatten_read_maps_missing_to_not_found() {
        let hit: TierAttempt<Option<u8>> = TierAttempt::Ok(Some(1));
        assert_eq!(hit.flatten_read(), TierAttempt::Ok(1));
        let miss: TierAttempt<Option<u8>> = TierAttempt::Ok(None);
        let miss = miss.flatten_read();
        assert_eq!(miss, TierAttempt::NotFound);
        assert!(miss.is_reachable());
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let result = bounded(Duration::from_millis(1000), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, TierError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeds_timeout_returns_error() {
        let result = bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, TierError>(())
        })
        .await;
        assert!(matches!(result, Err(TierError::Timeout { timeout_ms: 50 })));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_reports_timeout_as_network() {
        let key = StorageKey::new("orders").unwrap();
        let scope = UserScope::user("u").unwrap();
        let ctx = AttemptContext {
            tier: TierKind::Fallback,
            op: "get",
            key: &key,
            scope: &scope,
        };
        let outcome: TierAttempt<()> = attempt(ctx, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(outcome, TierAttempt::Network(msg) if msg.contains("timed out")));
    }
}
