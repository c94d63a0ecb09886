//! Fetch concurrency guard
//!
//! Process-wide singleton that deduplicates concurrent "load current profile"
//! operations. When N independent consumers decide within the same short
//! window that they need the profile, the identity backend is invoked at most
//! once; losers piggyback on the winner's result through the shared state
//! machine instead of queueing their own fetches.
//!
//! Modeled as an explicit service with an owned state struct behind a mutex
//! (not free-floating module globals) so it can be injected from the
//! composition root and tested in isolation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use stayport_common::time::Clock;
use stayport_domain::constants::{FETCH_DEBOUNCE_MS, FETCH_RETRY_DELAY_MS};
use tracing::debug;

/// Outcome of an [`ProfileFetchGuard::acquire`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Caller owns the fetch and must call `release` when done
    Proceed,
    /// The requested user's profile is already resident; update the local
    /// view from the shared state machine instead of fetching
    AlreadyLoaded,
    /// Another fetch is in flight (or just finished inside the debounce
    /// window); wait one bounded retry interval and re-check once
    Busy,
}

#[derive(Debug, Default)]
struct GuardState {
    is_fetching: bool,
    fetching_user_id: Option<String>,
    loaded_user_id: Option<String>,
    last_fetch_at: Option<Instant>,
}

/// Non-reentrant fetch mutex with a short post-completion debounce window
pub struct ProfileFetchGuard {
    clock: Arc<dyn Clock>,
    inner: Mutex<GuardState>,
}

impl ProfileFetchGuard {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: Mutex::new(GuardState::default()) }
    }

    /// How long a blocked caller should wait before its single re-check
    #[must_use]
    pub fn retry_delay() -> Duration {
        Duration::from_millis(FETCH_RETRY_DELAY_MS)
    }

    /// Try to become the fetch owner.
    ///
    /// `user_id_hint` is the user the caller intends to fetch, when known.
    /// At most one caller per process holds `Proceed` at any instant.
    pub fn acquire(&self, user_id_hint: Option<&str>) -> AcquireOutcome {
        let mut state = self.inner.lock();

        if state.is_fetching {
            debug!(in_flight = ?state.fetching_user_id, "Profile fetch already in flight");
            return AcquireOutcome::Busy;
        }

        if let (Some(hint), Some(loaded)) = (user_id_hint, state.loaded_user_id.as_deref()) {
            if hint == loaded {
                return AcquireOutcome::AlreadyLoaded;
            }
        }

        // Absorb duplicate mount effects: a second acquire right after a
        // fetch finished for the same triggering event must not refetch.
        if let Some(finished_at) = state.last_fetch_at {
            let elapsed = self.clock.now().saturating_duration_since(finished_at);
            if elapsed < Duration::from_millis(FETCH_DEBOUNCE_MS) {
                debug!(elapsed_ms = elapsed.as_millis() as u64, "Acquire inside debounce window");
                return AcquireOutcome::Busy;
            }
        }

        state.is_fetching = true;
        state.fetching_user_id = user_id_hint.map(str::to_string);
        AcquireOutcome::Proceed
    }

    /// Record fetch completion; must run on every path, error paths included.
    ///
    /// `result_user_id` is the user whose profile is now resident, `None`
    /// when the fetch failed or found no profile.
    pub fn release(&self, result_user_id: Option<&str>) {
        let mut state = self.inner.lock();
        if !state.is_fetching {
            // The guard was reset (sign-out) while this fetch was in flight;
            // recording residency now would resurrect a signed-out user.
            state.last_fetch_at = Some(self.clock.now());
            return;
        }
        state.is_fetching = false;
        state.fetching_user_id = None;
        state.loaded_user_id = result_user_id.map(str::to_string);
        state.last_fetch_at = Some(self.clock.now());
    }

    /// Record a profile made resident without a fetch (cache hydration), so
    /// later acquires for the same user short-circuit.
    pub fn mark_loaded(&self, user_id: &str) {
        self.inner.lock().loaded_user_id = Some(user_id.to_string());
    }

    /// Forget everything (sign-out); the next acquire starts from scratch
    pub fn reset(&self) {
        *self.inner.lock() = GuardState::default();
    }

    /// User whose profile is currently resident, if any
    #[must_use]
    pub fn loaded_user_id(&self) -> Option<String> {
        self.inner.lock().loaded_user_id.clone()
    }

    /// Whether a fetch is currently in flight
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.lock().is_fetching
    }
}
