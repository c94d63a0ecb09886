//! UI-visible authentication state
//!
//! Single source of truth observed by every UI subtree. Invariant:
//! `is_authenticated` implies `user` is present; `is_loading` is true only
//! while a bootstrap, login, register, or logout operation is in flight.

use serde::{Deserialize, Serialize};

use crate::types::profile::Profile;

/// Snapshot of the authentication state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub user: Option<Profile>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_authenticated: bool,
}

impl AuthState {
    /// Resolved state for an anonymous visitor
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { user: None, is_loading: false, error: None, is_authenticated: false }
    }

    /// Transient state while an operation is in flight
    #[must_use]
    pub fn loading() -> Self {
        Self { user: None, is_loading: true, error: None, is_authenticated: false }
    }

    /// Transient state that keeps the previous user visible (e.g. during
    /// logout) instead of flashing an anonymous frame.
    #[must_use]
    pub fn loading_from(previous: &Self) -> Self {
        Self {
            user: previous.user.clone(),
            is_loading: true,
            error: None,
            is_authenticated: previous.is_authenticated,
        }
    }

    /// Resolved state for a signed-in user
    #[must_use]
    pub fn authenticated(profile: Profile) -> Self {
        Self { user: Some(profile), is_loading: false, error: None, is_authenticated: true }
    }

    /// Resolved error state; never authenticated
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self { user: None, is_loading: false, error: Some(message.into()), is_authenticated: false }
    }

    /// Copy of this state with an error message attached, everything else
    /// untouched (used for background failures like a failed token refresh).
    #[must_use]
    pub fn with_error(&self, message: impl Into<String>) -> Self {
        Self {
            user: self.user.clone(),
            is_loading: false,
            error: Some(message.into()),
            is_authenticated: self.is_authenticated,
        }
    }

    /// Whether this is a settled (non-loading, non-error) state
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.is_loading && self.error.is_none()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth state constructors.
    use chrono::Utc;

    use super::*;
    use crate::types::profile::{AccountStatus, UserRole};

    fn profile() -> Profile {
        Profile {
            id: "u1".into(),
            email: "a@b.c".into(),
            role: UserRole::Admin,
            full_name: "A".into(),
            phone: None,
            avatar_url: None,
            status: AccountStatus::Active,
            language: "en".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn authenticated_implies_user_present() {
        let state = AuthState::authenticated(profile());
        assert!(state.is_authenticated);
        assert!(state.user.is_some());
        assert!(state.is_settled());
    }

    #[test]
    fn failed_state_is_never_authenticated() {
        let state = AuthState::failed("boom");
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(!state.is_settled());
    }

    #[test]
    fn loading_from_preserves_the_user() {
        let prev = AuthState::authenticated(profile());
        let loading = AuthState::loading_from(&prev);
        assert!(loading.is_loading);
        assert!(loading.user.is_some());
        assert!(loading.is_authenticated);
    }
}
