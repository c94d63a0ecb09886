//! User profile types
//!
//! Application-level user record synced from the identity backend's
//! `profiles` table. Distinct from the raw authentication credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a profile holds on the platform.
///
/// Each front-end shell admits exactly one role; the role validator enforces
/// the match after every successful profile load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Customer,
    Hotel,
    Staff,
}

impl UserRole {
    /// Wire/storage form of the role (matches the backend column values)
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Customer => "CUSTOMER",
            Self::Hotel => "HOTEL",
            Self::Staff => "STAFF",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    PendingVerification,
}

impl AccountStatus {
    /// Whether the account may establish a session.
    ///
    /// `PendingVerification` accounts may sign in (verification is nagged in
    /// the UI); suspended and inactive accounts may not.
    #[must_use]
    pub fn allows_sign_in(&self) -> bool {
        matches!(self, Self::Active | Self::PendingVerification)
    }
}

/// User profile row from the identity backend
///
/// One profile per backend account; `id` is the backend account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub status: AccountStatus,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update sent to the backend's row API
///
/// `None` fields are omitted from the PATCH body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    /// Whether the change set would modify anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for profile types.
    use super::*;

    #[test]
    fn role_round_trips_screaming_snake_case() {
        let json = serde_json::to_string(&UserRole::Hotel).unwrap();
        assert_eq!(json, "\"HOTEL\"");
        let role: UserRole = serde_json::from_str("\"STAFF\"").unwrap();
        assert_eq!(role, UserRole::Staff);
    }

    #[test]
    fn suspended_accounts_cannot_sign_in() {
        assert!(AccountStatus::Active.allows_sign_in());
        assert!(AccountStatus::PendingVerification.allows_sign_in());
        assert!(!AccountStatus::Suspended.allows_sign_in());
        assert!(!AccountStatus::Inactive.allows_sign_in());
    }

    #[test]
    fn empty_changes_are_detected() {
        assert!(ProfileChanges::default().is_empty());
        let changes = ProfileChanges { full_name: Some("Ren Tanaka".into()), avatar_url: None };
        assert!(!changes.is_empty());
        let json = serde_json::to_value(&changes).unwrap();
        assert!(json.get("avatar_url").is_none());
    }
}
