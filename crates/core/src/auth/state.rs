//! Auth state machine
//!
//! Single source of truth for `{ user, is_loading, error, is_authenticated }`.
//! One canonical implementation, parameterized by the hosting application's
//! expected role and a `skip_initial_check` option; observers share the state
//! through a watch channel.
//!
//! Staleness discipline: every async continuation captures a generation
//! counter and re-checks it before committing, so a `SignedOut` event always
//! wins over a concurrently in-flight fetch for the previous user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use stayport_domain::constants::BOOTSTRAP_TIMEOUT_SECS;
use stayport_domain::{
    AccountStatus, AuthError, AuthEvent, AuthState, Credentials, Profile, RegisterRequest, Result,
    UserRole,
};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::bootstrap::{FetchResolution, SessionBootstrapper};
use super::fetch_guard::ProfileFetchGuard;
use super::policy::SessionPolicyEnforcer;
use super::ports::{IdentityBackend, InsertOutcome, SignUpMetadata, SignUpOutcome};
use super::roles::enforce_access;
use super::session_store::SessionStore;
use crate::linking::LinkedSignIn;

/// Per-application tuning for the state machine
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Role the hosting application admits; `None` accepts any role
    pub expected_role: Option<UserRole>,
    /// Skip the bootstrap check entirely (embedding shells that drive their
    /// own session handoff)
    pub skip_initial_check: bool,
    /// Hard ceiling for bootstrap/login profile fetches
    pub fetch_timeout: Duration,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            expected_role: None,
            skip_initial_check: false,
            fetch_timeout: Duration::from_secs(BOOTSTRAP_TIMEOUT_SECS),
        }
    }
}

/// The auth/session state machine
pub struct AuthStateMachine {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
    guard: Arc<ProfileFetchGuard>,
    policy: Arc<SessionPolicyEnforcer>,
    bootstrapper: SessionBootstrapper,
    options: AuthOptions,
    state_tx: watch::Sender<AuthState>,
    /// Last settled (non-loading, non-error) state, for `clear_error`
    settled: Mutex<AuthState>,
    /// Bumped by sign-outs and user-initiated operations; stale async
    /// continuations compare against it before committing
    generation: AtomicU64,
}

impl AuthStateMachine {
    #[must_use]
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<SessionStore>,
        guard: Arc<ProfileFetchGuard>,
        policy: Arc<SessionPolicyEnforcer>,
        options: AuthOptions,
    ) -> Self {
        let bootstrapper = SessionBootstrapper::new(
            backend.clone(),
            store.clone(),
            guard.clone(),
            options.expected_role,
            options.fetch_timeout,
        );
        let (state_tx, _) = watch::channel(AuthState::unauthenticated());
        Self {
            backend,
            store,
            guard,
            policy,
            bootstrapper,
            options,
            state_tx,
            settled: Mutex::new(AuthState::unauthenticated()),
            generation: AtomicU64::new(0),
        }
    }

    /// Subscribe to state updates; the receiver immediately sees the current
    /// state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Resolve the initial auth state on application start.
    ///
    /// Anonymous visitors never see a loading state: the watch channel starts
    /// unauthenticated and only flips to loading when a network round-trip is
    /// actually coming.
    pub async fn initialize(&self) {
        if self.options.skip_initial_check {
            debug!("Initial session check skipped by configuration");
            return;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        if self.bootstrapper.needs_network() {
            self.commit(AuthState::loading());
        }

        match self.bootstrapper.resolve().await {
            Some(state) => {
                self.commit_if_current(generation, state);
            }
            None => {
                // Piggybacked on another consumer's fetch: wait (bounded)
                // for the winner's commit instead of issuing our own.
                let mut rx = self.subscribe();
                let _ = timeout(self.options.fetch_timeout, async {
                    while rx.borrow_and_update().is_loading {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await;
                if self.current().is_loading {
                    // Winner never resolved; never leave the UI on a spinner.
                    let settled = self.settled.lock().clone();
                    self.commit_if_current(generation, settled);
                }
            }
        }
    }

    /// Authenticate with password credentials.
    ///
    /// Errors are returned to the caller and mirrored into `AuthState.error`
    /// for passive observers. A session is only established when the profile
    /// passes role and status checks; any later failure tears it down again.
    pub async fn login(&self, credentials: Credentials) -> Result<Profile> {
        let generation = self.begin_op(AuthState::loading());
        info!(email = %credentials.email, "Login started");

        let outcome = match self
            .backend
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail_op(generation, err)),
        };

        let profile = match self.fetch_profile_with_timeout(&outcome.user_id).await {
            Ok(profile) => profile,
            Err(err) => return Err(self.reject_and_fail(generation, err).await),
        };

        if let Err(err) = enforce_access(&profile, self.options.expected_role) {
            return Err(self.reject_and_fail(generation, err).await);
        }

        self.store.write(&outcome.session);
        self.store.write_cached_profile(&profile);
        self.policy.apply(credentials.remember_me);
        self.guard.mark_loaded(&profile.id);
        self.commit_if_current(generation, AuthState::authenticated(profile.clone()));
        info!(user_id = %profile.id, "Login completed");
        Ok(profile)
    }

    /// Create an account and establish a session.
    ///
    /// The profile row is inserted client-side; a duplicate key means a
    /// backend trigger raced us and already created it, in which case the
    /// existing row is fetched instead.
    pub async fn register(&self, request: RegisterRequest) -> Result<Profile> {
        let generation = self.begin_op(AuthState::loading());
        info!(email = %request.email, "Registration started");

        let metadata = SignUpMetadata {
            role: Some(request.role),
            full_name: Some(request.full_name.clone()),
            ..SignUpMetadata::default()
        };
        let outcome =
            match self.backend.sign_up(&request.email, &request.password, metadata).await {
                Ok(SignUpOutcome::Created(outcome)) => outcome,
                Ok(SignUpOutcome::AlreadyExists) => {
                    let err =
                        AuthError::Backend("an account with this email already exists".into());
                    return Err(self.fail_op(generation, err));
                }
                Err(err) => return Err(self.fail_op(generation, err)),
            };

        let now = Utc::now();
        let profile = Profile {
            id: outcome.user_id.clone(),
            email: request.email.clone(),
            role: request.role,
            full_name: request.full_name.clone(),
            phone: request.phone.clone(),
            avatar_url: None,
            status: AccountStatus::PendingVerification,
            language: request.language.clone(),
            created_at: now,
            updated_at: now,
        };

        let profile = match self.backend.insert_profile(&profile).await {
            Ok(InsertOutcome::Inserted) => profile,
            Ok(InsertOutcome::DuplicateKey) => {
                debug!(user_id = %outcome.user_id, "Profile already created by backend trigger, fetching");
                match self.backend.fetch_profile(&outcome.user_id).await {
                    Ok(Some(existing)) => existing,
                    Ok(None) => {
                        let err = AuthError::Backend(
                            "profile missing after duplicate-key signup".into(),
                        );
                        return Err(self.reject_and_fail(generation, err).await);
                    }
                    Err(err) => return Err(self.reject_and_fail(generation, err).await),
                }
            }
            Err(err) => return Err(self.reject_and_fail(generation, err).await),
        };

        if let Err(err) = enforce_access(&profile, self.options.expected_role) {
            return Err(self.reject_and_fail(generation, err).await);
        }

        self.store.write(&outcome.session);
        self.store.write_cached_profile(&profile);
        self.policy.apply(request.remember_me);
        self.guard.mark_loaded(&profile.id);
        self.commit_if_current(generation, AuthState::authenticated(profile.clone()));
        info!(user_id = %profile.id, "Registration completed");
        Ok(profile)
    }

    /// Sign out.
    ///
    /// Always ends unauthenticated, even when the backend call fails: local
    /// state must never keep showing a logged-in user who asked to leave.
    pub async fn logout(&self) {
        let previous = self.current();
        self.begin_op(AuthState::loading_from(&previous));

        if let Err(err) = self.backend.sign_out().await {
            warn!(error = %err, "Backend sign-out failed, clearing local state anyway");
        }

        self.store.clear();
        self.store.clear_cached_profile();
        self.store.clear_policy();
        self.guard.reset();
        // Unconditional: no concurrent event may reverse an explicit logout.
        self.commit(AuthState::unauthenticated());
        info!("Logout completed");
    }

    /// Adopt a session established through the external-identity linker.
    ///
    /// Runs the same role/status gate as a password login before anything is
    /// observable as authenticated.
    pub async fn complete_external_login(
        &self,
        linked: LinkedSignIn,
        remember_me: bool,
    ) -> Result<Profile> {
        let generation = self.begin_op(AuthState::loading());

        if let Err(err) = enforce_access(&linked.profile, self.options.expected_role) {
            return Err(self.reject_and_fail(generation, err).await);
        }

        self.store.write(&linked.session);
        self.store.write_cached_profile(&linked.profile);
        self.policy.apply(remember_me);
        self.guard.mark_loaded(&linked.profile.id);
        self.commit_if_current(generation, AuthState::authenticated(linked.profile.clone()));
        Ok(linked.profile)
    }

    /// Drop the error message and return to the last settled state without
    /// refetching
    pub fn clear_error(&self) {
        if self.current().error.is_none() {
            return;
        }
        let settled = self.settled.lock().clone();
        self.commit(settled);
    }

    /// Process a backend change event (delivered in order by the caller)
    pub async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedOut => {
                // Wins over any in-flight fetch for the previous user.
                self.generation.fetch_add(1, Ordering::SeqCst);
                self.store.clear();
                self.store.clear_cached_profile();
                self.store.clear_policy();
                self.guard.reset();

                let current = self.current();
                if current.is_authenticated || current.is_loading {
                    self.commit(AuthState::unauthenticated());
                } else {
                    // Already unauthenticated (possibly with an error the
                    // user still needs to read); just settle the baseline.
                    *self.settled.lock() = AuthState::unauthenticated();
                }
            }
            AuthEvent::SignedIn { user_id, session }
            | AuthEvent::TokenRefreshed { user_id, session } => {
                self.store.write(&session);

                if self.guard.loaded_user_id().as_deref() == Some(user_id.as_str()) {
                    // Profile already resident: flip the flag, no refetch.
                    let current = self.current();
                    if !current.is_authenticated {
                        if let Some(user) = current.user {
                            self.commit(AuthState::authenticated(user));
                        } else if let Some(entry) = self.store.read_cached_profile() {
                            self.commit(AuthState::authenticated(entry.profile));
                        }
                    }
                    return;
                }

                let generation = self.generation.load(Ordering::SeqCst);
                match self.bootstrapper.fetch_profile_guarded(&user_id).await {
                    Ok(FetchResolution::Loaded(profile)) => {
                        match enforce_access(&profile, self.options.expected_role) {
                            Ok(()) => {
                                self.store.write_cached_profile(&profile);
                                self.commit_if_current(
                                    generation,
                                    AuthState::authenticated(profile),
                                );
                            }
                            Err(err) => {
                                let state = self.teardown_session(err).await;
                                self.commit_if_current(generation, state);
                            }
                        }
                    }
                    Ok(FetchResolution::NoProfile) => {
                        warn!(user_id = %user_id, "Signed-in event for a user with no profile row");
                    }
                    Ok(FetchResolution::Piggybacked) => {}
                    Err(err) => {
                        // Background failure: mirrored into state, never thrown.
                        let state = self.current().with_error(err.to_string());
                        self.commit_if_current(generation, state);
                    }
                }
            }
            AuthEvent::TokenRefreshFailed => {
                // Possibly a transient network failure; the persisted
                // session is deliberately left in place.
                let state = self
                    .current()
                    .with_error("session refresh failed, please reload the application");
                self.commit(state);
            }
            AuthEvent::InitialSession | AuthEvent::PasswordRecovery => {
                debug!(event = ?event, "Ignoring informational auth event");
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn fetch_profile_with_timeout(&self, user_id: &str) -> Result<Profile> {
        match timeout(self.options.fetch_timeout, self.backend.fetch_profile(user_id)).await {
            Ok(Ok(Some(profile))) => Ok(profile),
            Ok(Ok(None)) => Err(AuthError::Backend("no profile exists for this account".into())),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(AuthError::Timeout),
        }
    }

    fn begin_op(&self, loading: AuthState) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.commit(loading);
        generation
    }

    fn commit(&self, state: AuthState) {
        if state.is_settled() {
            *self.settled.lock() = state.clone();
        }
        // send_replace stores the value even when no receiver is subscribed;
        // `current()` must always observe the latest commit.
        let _ = self.state_tx.send_replace(state);
    }

    /// Commit only when no intervening sign-out or newer operation
    /// invalidated this continuation
    fn commit_if_current(&self, generation: u64, state: AuthState) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale async result");
            return false;
        }
        self.commit(state);
        true
    }

    /// Mirror a failure into state and hand it back to the caller
    fn fail_op(&self, generation: u64, err: AuthError) -> AuthError {
        self.commit_if_current(generation, AuthState::failed(err.to_string()));
        err
    }

    /// Tear down a half-established session, then fail the operation
    async fn reject_and_fail(&self, generation: u64, err: AuthError) -> AuthError {
        let state = self.teardown_session(err.clone()).await;
        self.commit_if_current(generation, state);
        err
    }

    async fn teardown_session(&self, err: AuthError) -> AuthState {
        if let Err(sign_out_err) = self.backend.sign_out().await {
            warn!(error = %sign_out_err, "Backend sign-out failed while tearing down session");
        }
        self.store.clear();
        self.store.clear_cached_profile();
        self.store.clear_policy();
        self.guard.reset();
        AuthState::failed(err.to_string())
    }
}
