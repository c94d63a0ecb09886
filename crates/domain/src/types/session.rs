//! Session credential and cache types
//!
//! The session is an opaque credential pair owned by the identity backend;
//! the core only keeps a serialized copy for fast-path bootstrap, plus a
//! timestamped profile snapshot with a staleness rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PROFILE_CACHE_TTL_MS;
use crate::types::profile::Profile;

/// Backend-issued session credential, bound 1:1 to a profile at any instant.
///
/// `user_id` records the binding so bootstrap and change-event handling know
/// whose profile to fetch without an extra round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiration timestamp (UTC); `None` when the backend did not
    /// report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Check if the access token is expired or will expire within the given
    /// threshold.
    ///
    /// Returns `false` when no expiry is set.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at,
            None => false,
        }
    }
}

/// Cached profile snapshot written on every successful profile fetch.
///
/// `timestamp_ms` is milliseconds since the UNIX epoch at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProfileEntry {
    pub profile: Profile,
    pub timestamp_ms: i64,
}

impl CachedProfileEntry {
    /// Whether this entry is too old to trust for authorization decisions.
    ///
    /// A timestamp in the future means a clock went backwards between writes;
    /// such entries are never trusted.
    #[must_use]
    pub fn is_stale(&self, now_ms: i64) -> bool {
        if self.timestamp_ms > now_ms {
            return true;
        }
        now_ms - self.timestamp_ms > PROFILE_CACHE_TTL_MS
    }
}

/// Persistence policy decided at login time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub remember_me: bool,
    pub session_only: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { remember_me: true, session_only: false }
    }
}

/// Password credentials for an explicit login
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

/// Self-service registration request
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: super::profile::UserRole,
    pub phone: Option<String>,
    pub language: String,
    pub remember_me: bool,
}

/// Change event delivered by the identity backend.
///
/// Modeled as a tagged union so that every consumer matches exhaustively and
/// an unhandled event kind is a compile-time question, not a silent string
/// mismatch.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn { user_id: String, session: Session },
    SignedOut,
    TokenRefreshed { user_id: String, session: Session },
    TokenRefreshFailed,
    InitialSession,
    PasswordRecovery,
}

#[cfg(test)]
mod tests {
    //! Unit tests for session types.
    use super::*;
    use crate::types::profile::{AccountStatus, UserRole};

    fn sample_profile() -> Profile {
        Profile {
            id: "user-1".into(),
            email: "guest@example.com".into(),
            role: UserRole::Customer,
            full_name: "Guest One".into(),
            phone: None,
            avatar_url: None,
            status: AccountStatus::Active,
            language: "en".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn session_expiry_check() {
        let session = Session {
            user_id: "user-1".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(3600)),
        };
        assert!(!session.is_expired(300));
        assert!(session.is_expired(7200));
    }

    #[test]
    fn session_without_expiry_is_never_expired() {
        let session = Session {
            user_id: "user-1".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: None,
        };
        assert!(!session.is_expired(300));
    }

    #[test]
    fn cache_entry_goes_stale_after_ttl() {
        let entry = CachedProfileEntry { profile: sample_profile(), timestamp_ms: 1_000_000 };
        assert!(!entry.is_stale(1_000_000 + PROFILE_CACHE_TTL_MS));
        assert!(entry.is_stale(1_000_000 + PROFILE_CACHE_TTL_MS + 1));
    }

    #[test]
    fn future_timestamp_is_treated_as_stale() {
        let entry = CachedProfileEntry { profile: sample_profile(), timestamp_ms: 2_000_000 };
        assert!(entry.is_stale(1_999_999));
    }

    #[test]
    fn default_policy_remembers() {
        let policy = SessionPolicy::default();
        assert!(policy.remember_me);
        assert!(!policy.session_only);
    }
}
