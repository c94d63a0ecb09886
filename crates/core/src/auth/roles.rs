//! Role enforcement
//!
//! Each hosting application declares the role it admits; a freshly loaded
//! profile must carry that role before the caller ever observes an
//! authenticated state.

use stayport_domain::{AuthError, AuthState, Profile, Result, UserRole};

/// Check a loaded profile against the hosting application's expected role.
///
/// `None` means the application accepts any role. Callers must sign out the
/// backend session before surfacing the returned `InvalidRole` error, so a
/// wrong-role session is never left half-authenticated.
pub fn enforce_access(profile: &Profile, expected_role: Option<UserRole>) -> Result<()> {
    if let Some(expected) = expected_role {
        if profile.role != expected {
            return Err(AuthError::InvalidRole);
        }
    }
    if !profile.status.allows_sign_in() {
        return Err(AuthError::AccountDisabled);
    }
    Ok(())
}

/// Whether the current user holds the given role
#[must_use]
pub fn has_role(state: &AuthState, role: UserRole) -> bool {
    state.user.as_ref().is_some_and(|user| user.role == role)
}

/// Whether the current user holds any of the given roles
#[must_use]
pub fn has_any_role(state: &AuthState, roles: &[UserRole]) -> bool {
    state.user.as_ref().is_some_and(|user| roles.contains(&user.role))
}
