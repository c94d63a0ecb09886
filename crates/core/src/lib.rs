//! # Stayport Core
//!
//! Pure coordination logic for the session core - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the identity backend and storage
//! - The session bootstrapper, fetch concurrency guard, and auth state
//!   machine
//! - Role validation, session persistence policy, and external-identity
//!   linking
//!
//! ## Architecture Principles
//! - Only depends on `stayport-common` and `stayport-domain`
//! - No HTTP, filesystem, or platform code
//! - All external dependencies via traits
//! - Pure, testable coordination logic

pub mod auth;
pub mod linking;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::bootstrap::{FetchResolution, SessionBootstrapper};
pub use auth::fetch_guard::{AcquireOutcome, ProfileFetchGuard};
pub use auth::policy::SessionPolicyEnforcer;
pub use auth::ports::{
    IdentityBackend, InsertOutcome, SignInOutcome, SignUpMetadata, SignUpOutcome,
};
pub use auth::roles::{enforce_access, has_any_role, has_role};
pub use auth::session_store::SessionStore;
pub use auth::state::{AuthOptions, AuthStateMachine};
pub use linking::credentials::SyntheticCredentials;
pub use linking::{ExternalIdentityLinker, LinkedSignIn, LinkerConfig};
