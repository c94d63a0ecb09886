//! Port interfaces for the identity backend
//!
//! These traits define the boundary between the session core's coordination
//! logic and the infrastructure implementation that talks to the identity
//! service. The backend is an opaque collaborator: sign-in/sign-up/sign-out,
//! token refresh, a change-event stream, and row-level access to the
//! `profiles` and invite tables.

use async_trait::async_trait;
use stayport_domain::{AuthEvent, InviteRecord, Profile, ProfileChanges, Result, Session};
use tokio::sync::broadcast;

/// Result of a successful sign-in or sign-up
#[derive(Debug, Clone, PartialEq)]
pub struct SignInOutcome {
    pub user_id: String,
    pub session: Session,
}

/// Result of a sign-up attempt.
///
/// "Already exists" is an expected race (concurrent logins deriving the same
/// synthetic credential), so it is a typed outcome rather than an error the
/// caller has to pattern-match out of a message string.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    Created(SignInOutcome),
    AlreadyExists,
}

/// Account metadata embedded at sign-up for backend-side triggers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignUpMetadata {
    pub role: Option<stayport_domain::UserRole>,
    pub full_name: Option<String>,
    pub external_id: Option<String>,
    pub invite_record_id: Option<String>,
}

/// Result of a profile row insert.
///
/// A duplicate key means a backend trigger raced us and already created the
/// row; callers fetch it instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateKey,
}

/// Opaque handle to the external identity/data service
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Authenticate with password credentials
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome>;

    /// Create a new account; metadata is picked up by backend-side triggers
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome>;

    /// Invalidate the current session on the backend
    async fn sign_out(&self) -> Result<()>;

    /// Exchange the refresh token for a fresh session
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    /// Current session held by the backend client, if any
    async fn get_session(&self) -> Option<Session>;

    /// Drop the locally held session without a network call.
    ///
    /// Synchronous so the session policy enforcer can run it inside a
    /// shutdown signal handler.
    fn clear_local_session(&self);

    /// Subscribe to backend change events (delivered in order)
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    // ------------------------------------------------------------------
    // Row-level API
    // ------------------------------------------------------------------

    /// Fetch a profile by backend account id
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Fetch a profile by email
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>>;

    /// Insert a profile row
    async fn insert_profile(&self, profile: &Profile) -> Result<InsertOutcome>;

    /// Apply a partial update to a profile row
    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()>;

    /// Fetch an invite record by id
    async fn find_invite_by_id(&self, id: &str) -> Result<Option<InviteRecord>>;

    /// Fetch the invite record claimed by the given account, if any
    async fn find_invite_by_owner(&self, owner_ref: &str) -> Result<Option<InviteRecord>>;

    /// Fetch the invite record carrying the given external identity, if any
    async fn find_invite_by_external_id(&self, external_id: &str) -> Result<Option<InviteRecord>>;

    /// Atomically claim an unclaimed invite record.
    ///
    /// Returns `false` when the record was already claimed (a concurrent
    /// claim won) or does not exist; the guard is enforced backend-side.
    async fn claim_invite(&self, id: &str, owner_ref: &str) -> Result<bool>;

    /// Attach an external identity to an invite record
    async fn set_invite_external_id(&self, id: &str, external_id: &str) -> Result<()>;

    /// Delete an invite record, scoped to the given owner.
    ///
    /// Deleting a record owned by someone else (or nobody) is a no-op; the
    /// ownership check is enforced backend-side.
    async fn delete_invite(&self, id: &str, owner_ref: &str) -> Result<()>;
}
