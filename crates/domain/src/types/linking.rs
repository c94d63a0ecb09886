//! External-identity linking types
//!
//! A chat-platform identity can act as an alternative login path for staff
//! onboarding. The invite record is an administrator-pre-provisioned row
//! awaiting its first login, as opposed to a row auto-created by a backend
//! trigger on self-signup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral request describing one link operation
#[derive(Debug, Clone)]
pub struct LinkRequest {
    /// Stable identifier issued by the external chat platform
    pub external_id: String,
    /// Display name reported by the external platform
    pub display_name: String,
    pub picture_url: Option<String>,
    /// Pre-provisioned invite record the operator expects this login to claim
    pub invite_record_id: Option<String>,
}

/// Administrator-managed staff record in the backend's invite table.
///
/// `owner_ref` is the backend account id once claimed; `None` means the
/// record is still awaiting its first login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub id: String,
    /// Canonical name curated by the operator; wins over the external
    /// platform's display name once linked.
    pub name: String,
    pub external_id: Option<String>,
    pub owner_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InviteRecord {
    /// Whether this record has been claimed by the given account
    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_ref.as_deref() == Some(user_id)
    }

    /// Whether this record is still awaiting a first login
    #[must_use]
    pub fn is_unclaimed(&self) -> bool {
        self.owner_ref.is_none()
    }
}
