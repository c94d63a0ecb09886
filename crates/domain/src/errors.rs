//! Error types used throughout the session core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Stayport auth operations
///
/// Every variant carries (or is) a human-readable message: errors from
/// user-initiated actions are returned to the caller and mirrored into
/// `AuthState.error`, so the `Display` output is what end users see.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid role for this application")]
    InvalidRole,

    #[error("this account has been disabled")]
    AccountDisabled,

    #[error("the request timed out, please try again")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("an account already exists for this identity, please contact support")]
    AccountExistsPasswordMismatch,

    #[error("no account matches this identity, please contact an administrator")]
    OrphanedIdentity,

    #[error("too many attempts, please wait before retrying")]
    RateLimit,

    #[error("this identity is already linked to another account")]
    IdentityAlreadyLinked,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// Result type alias for Stayport auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Severity level for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Standard interface for classifying errors by their characteristics.
///
/// Retryability drives the UI: retryable conditions get a "try again"
/// affordance, non-retryable ones tell the user to contact an administrator.
pub trait ErrorClassification {
    /// Whether retrying the failed operation can plausibly succeed
    fn is_retryable(&self) -> bool;

    /// Severity for monitoring and alerting
    fn severity(&self) -> ErrorSeverity;
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::RateLimit | Self::Backend(_) => true,
            // Duplicate/orphaned identity conditions are data inconsistencies
            // that automatic retry cannot resolve.
            Self::InvalidCredentials
            | Self::InvalidRole
            | Self::AccountDisabled
            | Self::AccountExistsPasswordMismatch
            | Self::OrphanedIdentity
            | Self::IdentityAlreadyLinked
            | Self::Storage(_)
            | Self::Unknown(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidCredentials | Self::Timeout | Self::RateLimit => ErrorSeverity::Info,
            Self::InvalidRole | Self::AccountDisabled | Self::Network(_) => ErrorSeverity::Warning,
            Self::Storage(_) | Self::Backend(_) | Self::Unknown(_) => ErrorSeverity::Error,
            Self::AccountExistsPasswordMismatch
            | Self::OrphanedIdentity
            | Self::IdentityAlreadyLinked => ErrorSeverity::Critical,
        }
    }
}
