//! Error taxonomy shared by every tier.
//!
//! Remote tiers report [`TierError`]; the resolver folds these into result
//! flags and never propagates them. Local tiers report [`LocalCacheError`],
//! which is fatal for the local write and does propagate.

/// Failure of a single remote-tier call.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    /// Remote unreachable (connect failure, reset, 5xx).
    #[error("network error: {0}")]
    Network(String),
    #[error("remote call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The tier needs an authenticated scope that is absent or was refused.
    #[error("authentication required")]
    AuthRequired,
    /// The tier does not implement the requested operation.
    #[error("operation not supported by this tier")]
    Unsupported,
    #[error("remote rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("could not decode remote payload: {0}")]
    Decode(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TierError {
    /// Whether the tier should be treated as down for this call only.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }

    /// Short label used for log fields and metric labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::AuthRequired => "auth_required",
            Self::Unsupported => "unsupported",
            Self::Rejected { .. } => "rejected",
            Self::Decode(_) => "decode",
            Self::Other(_) => "other",
        }
    }
}

/// Failure of a Local Cache call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocalCacheError {
    #[error("local cache quota exceeded: need {needed} bytes, {available} available")]
    Quota { needed: usize, available: usize },
    #[error("local cache i/o error: {0}")]
    Io(String),
    #[error("local cache is corrupt: {0}")]
    Corrupt(String),
}

impl LocalCacheError {
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

impl From<std::io::Error> for LocalCacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
