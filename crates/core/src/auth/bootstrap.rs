//! Session bootstrapper
//!
//! Produces the first `AuthState` an application sees. Anonymous visitors
//! resolve synchronously (no network, no spinner); a stored session with a
//! fresh cached profile hydrates optimistically; everything else goes through
//! the fetch concurrency guard with a hard timeout.

use std::sync::Arc;
use std::time::Duration;

use stayport_domain::{AuthError, AuthState, Profile, Result, UserRole};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::fetch_guard::{AcquireOutcome, ProfileFetchGuard};
use super::ports::IdentityBackend;
use super::roles::enforce_access;
use super::session_store::SessionStore;

/// How a guarded profile fetch resolved
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResolution {
    /// This caller owned the fetch and it returned a profile
    Loaded(Profile),
    /// This caller owned the fetch; the session is valid but no profile row
    /// exists (yet)
    NoProfile,
    /// Another consumer owns the fetch (or the profile is already resident);
    /// the caller piggybacks on the shared state machine update
    Piggybacked,
}

/// Resolves the initial auth state on application start
pub struct SessionBootstrapper {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
    guard: Arc<ProfileFetchGuard>,
    expected_role: Option<UserRole>,
    fetch_timeout: Duration,
}

impl SessionBootstrapper {
    #[must_use]
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<SessionStore>,
        guard: Arc<ProfileFetchGuard>,
        expected_role: Option<UserRole>,
        fetch_timeout: Duration,
    ) -> Self {
        Self { backend, store, guard, expected_role, fetch_timeout }
    }

    /// Whether resolving will need a network round-trip.
    ///
    /// Lets the state machine show a loading state only when one is coming.
    #[must_use]
    pub fn needs_network(&self) -> bool {
        if self.store.read().is_none() {
            return false;
        }
        match self.store.read_cached_profile() {
            Some(entry) => !self.store.is_cache_fresh(&entry),
            None => true,
        }
    }

    /// Resolve the initial auth state.
    ///
    /// Returns `None` when another consumer's in-flight fetch owns the
    /// resolution; the caller must not overwrite the shared state in that
    /// case. Timeouts and network failures resolve to an error state with
    /// the stored session left intact, so a flaky network never forces
    /// re-authentication.
    pub async fn resolve(&self) -> Option<AuthState> {
        let Some(session) = self.store.read() else {
            debug!("No stored session, resolving unauthenticated without network");
            return Some(AuthState::unauthenticated());
        };

        if let Some(entry) = self.store.read_cached_profile() {
            if self.store.is_cache_fresh(&entry) {
                if let Err(err) = enforce_access(&entry.profile, self.expected_role) {
                    return Some(self.reject_session(err).await);
                }
                debug!(user_id = %entry.profile.id, "Hydrating auth state from fresh cache");
                self.guard.mark_loaded(&entry.profile.id);
                return Some(AuthState::authenticated(entry.profile));
            }
        }

        match self.fetch_profile_guarded(&session.user_id).await {
            Ok(FetchResolution::Loaded(profile)) => {
                if let Err(err) = enforce_access(&profile, self.expected_role) {
                    return Some(self.reject_session(err).await);
                }
                self.store.write_cached_profile(&profile);
                Some(AuthState::authenticated(profile))
            }
            Ok(FetchResolution::NoProfile) => {
                // The profile row may not have propagated yet; not fatal,
                // and the session stays for the next attempt.
                warn!(user_id = %session.user_id, "Session valid but no profile row, resolving unauthenticated");
                Some(AuthState::unauthenticated())
            }
            Ok(FetchResolution::Piggybacked) => None,
            Err(err) => {
                // Session is deliberately preserved: reloading retries,
                // nobody is forced to log in again over a transient failure.
                warn!(error = %err, "Bootstrap profile fetch failed, session preserved");
                Some(AuthState::failed(err.to_string()))
            }
        }
    }

    /// Fetch a profile through the concurrency guard.
    ///
    /// A blocked caller waits a single bounded retry interval and re-checks
    /// once; if still blocked it resolves `Piggybacked` rather than hanging,
    /// so the UI never shows an infinite spinner. `release` runs on every
    /// path, error paths included.
    pub async fn fetch_profile_guarded(&self, user_id: &str) -> Result<FetchResolution> {
        let mut outcome = self.guard.acquire(Some(user_id));
        if outcome == AcquireOutcome::Busy {
            sleep(ProfileFetchGuard::retry_delay()).await;
            outcome = self.guard.acquire(Some(user_id));
        }

        match outcome {
            AcquireOutcome::Proceed => self.run_owned_fetch(user_id).await,
            AcquireOutcome::AlreadyLoaded | AcquireOutcome::Busy => {
                Ok(FetchResolution::Piggybacked)
            }
        }
    }

    async fn run_owned_fetch(&self, user_id: &str) -> Result<FetchResolution> {
        match timeout(self.fetch_timeout, self.backend.fetch_profile(user_id)).await {
            Ok(Ok(Some(profile))) => {
                self.guard.release(Some(&profile.id));
                Ok(FetchResolution::Loaded(profile))
            }
            Ok(Ok(None)) => {
                self.guard.release(None);
                Ok(FetchResolution::NoProfile)
            }
            Ok(Err(err)) => {
                self.guard.release(None);
                Err(err)
            }
            Err(_elapsed) => {
                self.guard.release(None);
                Err(AuthError::Timeout)
            }
        }
    }

    /// Tear down a session that failed validation (wrong role, disabled
    /// account) so it is never observable as authenticated.
    async fn reject_session(&self, err: AuthError) -> AuthState {
        if let Err(sign_out_err) = self.backend.sign_out().await {
            warn!(error = %sign_out_err, "Backend sign-out failed while rejecting session");
        }
        self.store.clear();
        self.store.clear_cached_profile();
        self.store.clear_policy();
        self.guard.reset();
        AuthState::failed(err.to_string())
    }
}
