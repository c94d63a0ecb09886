//! Domain data types for the session core

pub mod auth_state;
pub mod linking;
pub mod profile;
pub mod session;

pub use auth_state::AuthState;
pub use linking::{InviteRecord, LinkRequest};
pub use profile::{AccountStatus, Profile, ProfileChanges, UserRole};
pub use session::{AuthEvent, CachedProfileEntry, Credentials, RegisterRequest, Session, SessionPolicy};
