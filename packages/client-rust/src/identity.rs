//! In-process identity provider.

use parking_lot::RwLock;
use stratum_core::IdentityProvider;

/// Identity provider holding the current user id in memory.
///
/// The session layer calls [`sign_in`](StaticIdentity::sign_in) /
/// [`sign_out`](StaticIdentity::sign_out); the resolver only reads.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    /// An anonymous session.
    #[must_use]
    pub fn guest() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write() = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.write() = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_between_guest_and_user() {
        let identity = StaticIdentity::guest();
        assert!(identity.current_user_id().is_none());

        identity.sign_in("user-42");
        assert_eq!(identity.current_user_id().as_deref(), Some("user-42"));

        identity.sign_out();
        assert!(identity.current_user_id().is_none());

        let identity = StaticIdentity::signed_in("u");
        assert_eq!(identity.current_user_id().as_deref(), Some("u"));
    }
}
