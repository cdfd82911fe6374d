//! Owning-user scope for persisted records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel rendered for anonymous sessions.
pub const GUEST_SCOPE: &str = "guest";

/// Errors from constructing a [`UserScope`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("user id {0:?} collides with the guest sentinel")]
    GuestCollision(String),
    #[error("user id {0:?} must not contain ':'")]
    InvalidCharacter(String),
}

/// The owning user of a record set, or `Guest` for anonymous sessions.
///
/// Distinct scopes never share data: a user id equal to `"guest"` or
/// containing the native-key separator is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum UserScope {
    Guest,
    User(String),
}

impl UserScope {
    /// Builds an authenticated scope.
    ///
    /// An empty id yields [`UserScope::Guest`].
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] when the id is `"guest"` or contains `:`.
    pub fn user(id: impl Into<String>) -> Result<Self, ScopeError> {
        let id = id.into();
        if id.is_empty() {
            return Ok(Self::Guest);
        }
        if id == GUEST_SCOPE {
            return Err(ScopeError::GuestCollision(id));
        }
        if id.contains(':') {
            return Err(ScopeError::InvalidCharacter(id));
        }
        Ok(Self::User(id))
    }

    /// Maps the identity provider's output onto a scope.
    ///
    /// # Errors
    ///
    /// See [`UserScope::user`].
    pub fn from_user_id(id: Option<String>) -> Result<Self, ScopeError> {
        match id {
            Some(id) => Self::user(id),
            None => Ok(Self::Guest),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    /// String form used in native keys and remote rows.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Guest => GUEST_SCOPE,
            Self::User(id) => id,
        }
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
