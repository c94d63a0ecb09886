//! Session persistence policy
//!
//! Applies the remember-me decision at login time and enforces it at the
//! shell's close signal: a non-remembered session never survives a reload or
//! reopen.

use std::sync::Arc;

use stayport_domain::SessionPolicy;
use tracing::info;

use super::ports::IdentityBackend;
use super::session_store::SessionStore;

/// Applies and enforces the remember-me/session-only decision
pub struct SessionPolicyEnforcer {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<SessionStore>,
}

impl SessionPolicyEnforcer {
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>, store: Arc<SessionStore>) -> Self {
        Self { backend, store }
    }

    /// Record the policy decided at login time.
    ///
    /// `remember_me = true` keeps the backend's default durable behavior;
    /// `false` marks the session as tab-scoped.
    pub fn apply(&self, remember_me: bool) {
        self.store.set_policy(SessionPolicy { remember_me, session_only: !remember_me });
    }

    /// Run at the shell's close signal.
    ///
    /// Synchronous by design: close handlers cannot await. Clears the
    /// backend's locally held session and the persisted store when the
    /// durable flag says the user declined to be remembered.
    pub fn enforce_at_shutdown(&self) {
        if self.store.policy().remember_me {
            return;
        }
        info!("Session not marked remembered, clearing before close");
        self.backend.clear_local_session();
        self.store.clear();
        self.store.clear_cached_profile();
    }
}
