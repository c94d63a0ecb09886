//! Reactive auth surface for UI shells
//!
//! The handle is cheap to clone and hand to every UI subtree; all of them
//! observe the same state machine through the watch channel.

use std::sync::Arc;

use stayport_core::auth::roles;
use stayport_core::{AuthStateMachine, ExternalIdentityLinker};
use stayport_domain::{
    AuthState, Credentials, LinkRequest, Profile, RegisterRequest, Result, UserRole,
};
use tokio::sync::watch;

/// Cloneable facade over the auth state machine and the identity linker
#[derive(Clone)]
pub struct AuthHandle {
    machine: Arc<AuthStateMachine>,
    linker: Arc<ExternalIdentityLinker>,
}

impl AuthHandle {
    #[must_use]
    pub(crate) fn new(machine: Arc<AuthStateMachine>, linker: Arc<ExternalIdentityLinker>) -> Self {
        Self { machine, linker }
    }

    /// Subscribe to auth state updates
    #[must_use]
    pub fn state(&self) -> watch::Receiver<AuthState> {
        self.machine.subscribe()
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.machine.current()
    }

    /// Authenticate with password credentials
    pub async fn login(&self, credentials: Credentials) -> Result<Profile> {
        self.machine.login(credentials).await
    }

    /// Create an account and establish a session
    pub async fn register(&self, request: RegisterRequest) -> Result<Profile> {
        self.machine.register(request).await
    }

    /// Sign out; always resolves to unauthenticated
    pub async fn logout(&self) {
        self.machine.logout().await;
    }

    /// Drop the current error message
    pub fn clear_error(&self) {
        self.machine.clear_error();
    }

    /// Sign in through an external chat-platform identity
    pub async fn login_with_external_identity(
        &self,
        request: &LinkRequest,
        remember_me: bool,
    ) -> Result<Profile> {
        let linked = self.linker.login_or_create(request).await?;
        self.machine.complete_external_login(linked, remember_me).await
    }

    /// Attach an external identity to the signed-in account
    pub async fn link_external_identity(&self, external_id: &str) -> Result<()> {
        let state = self.machine.current();
        let user = state.user.as_ref().ok_or_else(|| {
            stayport_domain::AuthError::Unknown("no signed-in user to link against".into())
        })?;
        self.linker.link_to_current(&user.id, external_id).await
    }

    /// Whether the current user holds the given role
    #[must_use]
    pub fn has_role(&self, role: UserRole) -> bool {
        roles::has_role(&self.machine.current(), role)
    }

    /// Whether the current user holds any of the given roles
    #[must_use]
    pub fn has_any_role(&self, candidates: &[UserRole]) -> bool {
        roles::has_any_role(&self.machine.current(), candidates)
    }
}
