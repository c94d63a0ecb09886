//! Test utilities
//!
//! In-memory identity backend and fixture builders used by this crate's
//! integration tests and by downstream crates' tests (behind the
//! `test-utils` feature). The mock is scriptable: accounts, profiles,
//! invite records, artificial latency, and failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use stayport_domain::{
    AccountStatus, AuthError, AuthEvent, InviteRecord, Profile, ProfileChanges, Result, Session,
    UserRole,
};
use tokio::sync::broadcast;

use crate::auth::ports::{
    IdentityBackend, InsertOutcome, SignInOutcome, SignUpMetadata, SignUpOutcome,
};

/// What the simulated backend trigger does after a sign-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Trigger does nothing (lagging or not installed)
    #[default]
    Disabled,
    /// Trigger links the invite record named in the sign-up metadata
    LinksInvite,
    /// Trigger creates its own self-signup record instead of linking the
    /// invite (the duplicate-record race)
    CreatesDuplicateRecord,
}

#[derive(Debug, Clone)]
struct MockAccount {
    password: String,
    user_id: String,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, MockAccount>,
    profiles: HashMap<String, Profile>,
    invites: HashMap<String, InviteRecord>,
    session: Option<Session>,
    fetch_latency: Option<Duration>,
    sign_in_error: Option<AuthError>,
    sign_out_fails: bool,
    trigger_mode: TriggerMode,
    next_user: usize,
}

/// Scriptable in-memory implementation of [`IdentityBackend`]
pub struct MockIdentityBackend {
    state: Mutex<MockState>,
    events: broadcast::Sender<AuthEvent>,
    fetch_profile_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl Default for MockIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityBackend {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(MockState::default()),
            events,
            fetch_profile_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Register a password account
    pub fn add_account(&self, email: &str, password: &str, user_id: &str) {
        self.state.lock().accounts.insert(
            email.to_string(),
            MockAccount { password: password.to_string(), user_id: user_id.to_string() },
        );
    }

    /// Seed a profile row
    pub fn add_profile(&self, profile: Profile) {
        self.state.lock().profiles.insert(profile.id.clone(), profile);
    }

    /// Seed an invite record
    pub fn add_invite(&self, record: InviteRecord) {
        self.state.lock().invites.insert(record.id.clone(), record);
    }

    /// Delay every profile fetch by the given duration
    pub fn set_fetch_latency(&self, latency: Duration) {
        self.state.lock().fetch_latency = Some(latency);
    }

    /// Make every sign-in fail with the given error
    pub fn fail_sign_in_with(&self, err: AuthError) {
        self.state.lock().sign_in_error = Some(err);
    }

    /// Make sign-out reject (the local session is still dropped, matching a
    /// network failure after the request left the client)
    pub fn fail_sign_out(&self) {
        self.state.lock().sign_out_fails = true;
    }

    /// Configure the simulated post-signup trigger
    pub fn set_trigger_mode(&self, mode: TriggerMode) {
        self.state.lock().trigger_mode = mode;
    }

    /// Number of profile fetches issued so far
    #[must_use]
    pub fn fetch_profile_calls(&self) -> usize {
        self.fetch_profile_calls.load(Ordering::SeqCst)
    }

    /// Number of sign-out calls issued so far
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored profile
    #[must_use]
    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        self.state.lock().profiles.get(user_id).cloned()
    }

    /// Snapshot of a stored invite record
    #[must_use]
    pub fn invite(&self, id: &str) -> Option<InviteRecord> {
        self.state.lock().invites.get(id).cloned()
    }

    /// All invite records currently linked to the given account
    #[must_use]
    pub fn invites_owned_by(&self, user_id: &str) -> Vec<InviteRecord> {
        self.state
            .lock()
            .invites
            .values()
            .filter(|record| record.is_owned_by(user_id))
            .cloned()
            .collect()
    }

    /// Broadcast an auth event to subscribers
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn run_trigger(state: &mut MockState, user_id: &str, metadata: &SignUpMetadata) {
        match state.trigger_mode {
            TriggerMode::Disabled => {}
            TriggerMode::LinksInvite => {
                if let Some(invite_id) = &metadata.invite_record_id {
                    if let Some(record) = state.invites.get_mut(invite_id) {
                        if record.owner_ref.is_none() {
                            record.owner_ref = Some(user_id.to_string());
                        }
                    }
                }
            }
            TriggerMode::CreatesDuplicateRecord => {
                let id = format!("auto-{user_id}");
                state.invites.insert(
                    id.clone(),
                    InviteRecord {
                        id,
                        name: metadata.full_name.clone().unwrap_or_else(|| "Self Signup".into()),
                        external_id: metadata.external_id.clone(),
                        owner_ref: Some(user_id.to_string()),
                        created_at: Utc::now(),
                    },
                );
            }
        }
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        let mut state = self.state.lock();
        if let Some(err) = state.sign_in_error.clone() {
            return Err(err);
        }
        let account = state.accounts.get(email).cloned();
        match account {
            Some(account) if account.password == password => {
                let session = session_fixture(&account.user_id);
                state.session = Some(session.clone());
                Ok(SignInOutcome { user_id: account.user_id, session })
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome> {
        let mut state = self.state.lock();
        if state.accounts.contains_key(email) {
            return Ok(SignUpOutcome::AlreadyExists);
        }
        state.next_user += 1;
        let user_id = format!("user-{}", state.next_user);
        state.accounts.insert(
            email.to_string(),
            MockAccount { password: password.to_string(), user_id: user_id.clone() },
        );
        Self::run_trigger(&mut state, &user_id, &metadata);
        let session = session_fixture(&user_id);
        state.session = Some(session.clone());
        Ok(SignUpOutcome::Created(SignInOutcome { user_id, session }))
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.session = None;
        if state.sign_out_fails {
            return Err(AuthError::Network("sign-out request failed".into()));
        }
        Ok(())
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session> {
        let state = self.state.lock();
        state.session.clone().ok_or(AuthError::InvalidCredentials)
    }

    async fn get_session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    fn clear_local_session(&self) {
        self.state.lock().session = None;
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.fetch_profile_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.state.lock().fetch_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.state.lock().profiles.get(user_id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        Ok(self.state.lock().profiles.values().find(|p| p.email == email).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<InsertOutcome> {
        let mut state = self.state.lock();
        if state.profiles.contains_key(&profile.id) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()> {
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| AuthError::Backend("profile not found".into()))?;
        if let Some(name) = &changes.full_name {
            profile.full_name = name.clone();
        }
        if let Some(url) = &changes.avatar_url {
            profile.avatar_url = Some(url.clone());
        }
        profile.updated_at = Utc::now();
        Ok(())
    }

    async fn find_invite_by_id(&self, id: &str) -> Result<Option<InviteRecord>> {
        Ok(self.state.lock().invites.get(id).cloned())
    }

    async fn find_invite_by_owner(&self, owner_ref: &str) -> Result<Option<InviteRecord>> {
        Ok(self
            .state
            .lock()
            .invites
            .values()
            .find(|record| record.is_owned_by(owner_ref))
            .cloned())
    }

    async fn find_invite_by_external_id(&self, external_id: &str) -> Result<Option<InviteRecord>> {
        Ok(self
            .state
            .lock()
            .invites
            .values()
            .find(|record| record.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn claim_invite(&self, id: &str, owner_ref: &str) -> Result<bool> {
        let mut state = self.state.lock();
        match state.invites.get_mut(id) {
            Some(record) if record.owner_ref.is_none() => {
                record.owner_ref = Some(owner_ref.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_invite_external_id(&self, id: &str, external_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .invites
            .get_mut(id)
            .ok_or_else(|| AuthError::Backend("invite record not found".into()))?;
        record.external_id = Some(external_id.to_string());
        Ok(())
    }

    async fn delete_invite(&self, id: &str, owner_ref: &str) -> Result<()> {
        let mut state = self.state.lock();
        // Ownership-scoped, like the backend-side filtered DELETE: a record
        // owned by someone else is silently left alone.
        if state.invites.get(id).is_some_and(|record| record.is_owned_by(owner_ref)) {
            state.invites.remove(id);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

/// Profile fixture with sensible defaults
#[must_use]
pub fn profile_fixture(id: &str, role: UserRole) -> Profile {
    let now = Utc::now();
    Profile {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        role,
        full_name: format!("User {id}"),
        phone: None,
        avatar_url: None,
        status: AccountStatus::Active,
        language: "en".into(),
        created_at: now,
        updated_at: now,
    }
}

/// Session fixture bound to the given account
#[must_use]
pub fn session_fixture(user_id: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
    }
}

/// Unclaimed invite record fixture
#[must_use]
pub fn invite_fixture(id: &str, name: &str) -> InviteRecord {
    InviteRecord {
        id: id.to_string(),
        name: name.to_string(),
        external_id: None,
        owner_ref: None,
        created_at: Utc::now(),
    }
}
