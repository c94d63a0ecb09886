//! Persisted session store
//!
//! Thin wrapper over a durable and an ephemeral key/value scope. Holds the
//! serialized session, a timestamped profile snapshot, and the two
//! persistence-policy flags. All operations are synchronous and never fail
//! outward: a parse failure on read is treated as "no value" (log only),
//! since a corrupt cache must never block login.

use std::sync::Arc;

use stayport_common::storage::KeyValueStore;
use stayport_common::time::Clock;
use stayport_domain::constants::{
    KEY_PROFILE_CACHE, KEY_REMEMBER_ME, KEY_SESSION, KEY_SESSION_ONLY, STORAGE_NAMESPACE_PREFIX,
};
use stayport_domain::{CachedProfileEntry, Profile, Session, SessionPolicy};
use tracing::{debug, warn};

/// Namespaced persistence facade for one hosting application.
///
/// Keys are prefixed `stayport.<tenant>.`; two shells on the same machine
/// never share a session entry.
pub struct SessionStore {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create a store scoped to the given tenant namespace
    #[must_use]
    pub fn new(
        durable: Arc<dyn KeyValueStore>,
        ephemeral: Arc<dyn KeyValueStore>,
        tenant: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            namespace: format!("{STORAGE_NAMESPACE_PREFIX}.{tenant}"),
            clock,
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{suffix}", self.namespace)
    }

    /// Read the serialized session, `None` when absent or unreadable
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        let raw = self.durable.get(&self.key(KEY_SESSION))?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(error = %err, "Stored session failed to parse, treating as absent");
                None
            }
        }
    }

    /// Persist the session for fast-path bootstrap
    pub fn write(&self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(raw) => self.durable.set(&self.key(KEY_SESSION), &raw),
            Err(err) => warn!(error = %err, "Failed to serialize session, skipping write"),
        }
    }

    /// Remove the serialized session
    pub fn clear(&self) {
        self.durable.remove(&self.key(KEY_SESSION));
    }

    /// Read the cached profile snapshot, `None` when absent or unreadable
    #[must_use]
    pub fn read_cached_profile(&self) -> Option<CachedProfileEntry> {
        let raw = self.durable.get(&self.key(KEY_PROFILE_CACHE))?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Cached profile failed to parse, treating as absent");
                None
            }
        }
    }

    /// Cache the profile with the current wall-clock timestamp
    pub fn write_cached_profile(&self, profile: &Profile) {
        let entry = CachedProfileEntry {
            profile: profile.clone(),
            timestamp_ms: self.clock.millis_since_epoch(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => self.durable.set(&self.key(KEY_PROFILE_CACHE), &raw),
            Err(err) => warn!(error = %err, "Failed to serialize cached profile, skipping write"),
        }
    }

    /// Remove the cached profile snapshot
    pub fn clear_cached_profile(&self) {
        self.durable.remove(&self.key(KEY_PROFILE_CACHE));
    }

    /// Whether the entry is still fresh against the 5-minute TTL
    #[must_use]
    pub fn is_cache_fresh(&self, entry: &CachedProfileEntry) -> bool {
        !entry.is_stale(self.clock.millis_since_epoch())
    }

    /// Current persistence policy.
    ///
    /// Absent flags default to "remember" - the backend persists sessions
    /// unless told otherwise.
    #[must_use]
    pub fn policy(&self) -> SessionPolicy {
        let remember_me =
            self.durable.get(&self.key(KEY_REMEMBER_ME)).map_or(true, |v| v != "false");
        let session_only =
            self.ephemeral.get(&self.key(KEY_SESSION_ONLY)).is_some_and(|v| v == "true");
        SessionPolicy { remember_me, session_only }
    }

    /// Record the persistence policy decided at login time.
    ///
    /// `session_only` lives in the ephemeral scope so it vanishes with the
    /// tab; `remember_me` is durable so the close-signal listener can read it
    /// on the next startup.
    pub fn set_policy(&self, policy: SessionPolicy) {
        self.durable
            .set(&self.key(KEY_REMEMBER_ME), if policy.remember_me { "true" } else { "false" });
        if policy.session_only {
            self.ephemeral.set(&self.key(KEY_SESSION_ONLY), "true");
        } else {
            self.ephemeral.remove(&self.key(KEY_SESSION_ONLY));
        }
        debug!(remember_me = policy.remember_me, "Session policy recorded");
    }

    /// Reset policy flags to their defaults (on logout)
    pub fn clear_policy(&self) {
        self.durable.remove(&self.key(KEY_REMEMBER_ME));
        self.ephemeral.remove(&self.key(KEY_SESSION_ONLY));
    }
}
