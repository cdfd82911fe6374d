//! Errors surfaced to resolver and sweeper callers.
//!
//! Only local-cache and serialization failures reach the caller of a
//! resolver operation. Remote-tier failures are folded into result flags.

use stratum_core::{LocalCacheError, ScopeError};

/// Fatal failure of a resolver operation.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The value could not be encoded. No tier was touched.
    #[error("value is not serializable: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The local write ran out of capacity.
    ///
    /// `remote_written` reports whether a remote tier accepted the value.
    #[error("local cache quota exceeded (remote written: {remote_written}): {source}")]
    LocalCacheQuota {
        source: LocalCacheError,
        remote_written: bool,
    },
    #[error("local cache failure (remote written: {remote_written}): {source}")]
    LocalCache {
        source: LocalCacheError,
        remote_written: bool,
    },
}

impl ResolverError {
    /// Wraps a local-cache failure, keeping the remote outcome.
    #[must_use]
    pub fn local(source: LocalCacheError, remote_written: bool) -> Self {
        if source.is_quota() {
            Self::LocalCacheQuota {
                source,
                remote_written,
            }
        } else {
            Self::LocalCache {
                source,
                remote_written,
            }
        }
    }

    /// Whether a remote tier accepted the value despite the failure.
    #[must_use]
    pub fn remote_written(&self) -> bool {
        match self {
            Self::Serialization(_) => false,
            Self::LocalCacheQuota { remote_written, .. }
            | Self::LocalCache { remote_written, .. } => *remote_written,
        }
    }
}

/// Reasons a migration sweep cannot start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    #[error("migration requires an authenticated user scope")]
    Unauthenticated,
    /// The identity provider reported an id that cannot name a scope.
    #[error("current user id is not a valid scope: {0}")]
    InvalidScope(#[from] ScopeError),
    #[error("tier policy {policy} has no remote tier to migrate into")]
    NoRemoteTier { policy: &'static str },
}
