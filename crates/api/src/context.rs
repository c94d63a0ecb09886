//! Application context - dependency injection container
//!
//! The single composition root: wires the infra adapters into the core
//! services, owns the fetch-guard singleton, forwards backend change events
//! into the state machine in delivery order, and hosts the shutdown hook for
//! the session policy.

use std::sync::Arc;

use stayport_common::storage::MemoryKeyValueStore;
use stayport_common::time::SystemClock;
use stayport_core::{
    AuthOptions, AuthStateMachine, ExternalIdentityLinker, IdentityBackend, LinkerConfig,
    ProfileFetchGuard, SessionPolicyEnforcer, SessionStore,
};
use stayport_infra::{BackendConfig, FileKeyValueStore, HttpIdentityBackend};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TenantConfig;
use crate::guard::RouteGuard;
use crate::handle::AuthHandle;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: TenantConfig,
    pub backend: Arc<dyn IdentityBackend>,
    pub store: Arc<SessionStore>,
    pub machine: Arc<AuthStateMachine>,
    pub policy: Arc<SessionPolicyEnforcer>,
    pub linker: Arc<ExternalIdentityLinker>,
    pub route_guard: RouteGuard,
}

impl AppContext {
    /// Build the context for one hosting application.
    ///
    /// The HTTP backend is constructed here; tests wire a mock through
    /// [`AppContext::build_with_backend`].
    #[must_use]
    pub fn build(config: TenantConfig) -> Arc<Self> {
        let backend: Arc<dyn IdentityBackend> = Arc::new(HttpIdentityBackend::new(BackendConfig {
            base_url: config.backend.base_url.clone(),
            api_key: config.backend.api_key.clone(),
        }));
        Self::build_with_backend(config, backend)
    }

    /// Build the context around an already-constructed backend
    #[must_use]
    pub fn build_with_backend(config: TenantConfig, backend: Arc<dyn IdentityBackend>) -> Arc<Self> {
        let clock = Arc::new(SystemClock);
        let durable = Arc::new(FileKeyValueStore::open(config.store_path()));
        let ephemeral = Arc::new(MemoryKeyValueStore::new());
        let store = Arc::new(SessionStore::new(
            durable,
            ephemeral,
            config.tenant.namespace(),
            clock.clone(),
        ));
        let guard = Arc::new(ProfileFetchGuard::new(clock));
        let policy = Arc::new(SessionPolicyEnforcer::new(backend.clone(), store.clone()));
        let machine = Arc::new(AuthStateMachine::new(
            backend.clone(),
            store.clone(),
            guard,
            policy.clone(),
            AuthOptions {
                expected_role: Some(config.tenant.expected_role()),
                ..AuthOptions::default()
            },
        ));
        let linker = Arc::new(ExternalIdentityLinker::new(
            backend.clone(),
            LinkerConfig {
                pepper: config.backend.link_pepper.clone(),
                email_domain: config.backend.link_email_domain.clone(),
                role: config.tenant.expected_role(),
            },
        ));
        let route_guard = RouteGuard::new(config.login_path.clone());

        info!(tenant = config.tenant.namespace(), "Application context built");
        Arc::new(Self { config, backend, store, machine, policy, linker, route_guard })
    }

    /// Resolve the initial auth state and start forwarding backend change
    /// events. Returns the listener task handle.
    pub async fn initialize(self: &Arc<Self>) -> JoinHandle<()> {
        let listener = self.spawn_event_listener();
        self.machine.initialize().await;
        listener
    }

    /// Forward backend change events into the state machine, in delivery
    /// order
    #[must_use]
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.backend.subscribe();
        let machine = self.machine.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => machine.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event stream lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// The reactive surface handed to the UI layer
    #[must_use]
    pub fn auth_handle(self: &Arc<Self>) -> AuthHandle {
        AuthHandle::new(self.machine.clone(), self.linker.clone())
    }

    /// Hook for the shell's close signal.
    ///
    /// Skipped in local development builds so hot-reload loops do not keep
    /// logging developers out.
    pub fn on_shutdown(&self) {
        if cfg!(debug_assertions) {
            debug!("Development build, skipping session policy enforcement on close");
            return;
        }
        self.policy.enforce_at_shutdown();
    }
}
