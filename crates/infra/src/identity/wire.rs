//! Wire formats for the identity service
//!
//! Deserializes token-grant and error responses from the auth endpoints.
//! Profile and invite rows reuse the domain types directly - the row API
//! returns the table columns as-is.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use stayport_domain::{AuthError, Session, UserRole};

/// Successful response from `/auth/v1/token` and `/auth/v1/signup`
#[derive(Debug, Deserialize)]
pub struct TokenGrantResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub user: WireUser,
}

/// Account object embedded in token responses
#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: String,
}

impl TokenGrantResponse {
    /// Build the domain session, computing the absolute expiry from
    /// `expires_in`
    #[must_use]
    pub fn into_session(self) -> Session {
        let expires_at =
            self.expires_in.filter(|secs| *secs > 0).map(|secs| Utc::now() + Duration::seconds(secs));
        Session {
            user_id: self.user.id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Sign-up request body; `data` lands in the account metadata that
/// backend-side triggers read
#[derive(Debug, Serialize)]
pub struct SignUpBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpData,
}

/// Account metadata embedded at sign-up
#[derive(Debug, Serialize)]
pub struct SignUpData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_record_id: Option<String>,
}

/// Error response from the auth endpoints.
///
/// The service emits two shapes (`error`/`error_description` and
/// `error_code`/`msg`); both are absorbed here.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
}

impl ErrorBody {
    /// Best-effort parse; an unreadable body yields the empty default
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// Human-readable message for the error, falling back to the status line
    #[must_use]
    pub fn message(&self, status: u16) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("HTTP {status}"))
    }

    /// Whether this is the "account already exists" sign-up rejection
    #[must_use]
    pub fn is_duplicate_signup(&self) -> bool {
        if self.error_code.as_deref() == Some("user_already_exists") {
            return true;
        }
        self.msg
            .as_deref()
            .is_some_and(|msg| msg.contains("already registered") || msg.contains("already exists"))
    }
}

/// Map an auth-endpoint error response into the domain taxonomy
#[must_use]
pub fn map_auth_error(status: u16, body: &ErrorBody) -> AuthError {
    match status {
        400 | 401 => AuthError::InvalidCredentials,
        403 => AuthError::AccountDisabled,
        429 => AuthError::RateLimit,
        _ => AuthError::Backend(body.message(status)),
    }
}

/// Map a transport failure into the domain taxonomy
#[must_use]
pub fn map_transport_error(err: &reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for wire parsing.
    use super::*;

    #[test]
    fn token_grant_builds_a_bound_session() {
        let raw = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": "user-1", "email": "a@b.c" }
        }"#;
        let response: TokenGrantResponse = serde_json::from_str(raw).expect("parse");
        let session = response.into_session();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token, "at");
        assert!(session.expires_at.is_some());
        assert!(!session.is_expired(60));
    }

    #[test]
    fn both_error_shapes_are_absorbed() {
        let grant_shape = ErrorBody::parse(r#"{"error":"invalid_grant","error_description":"bad creds"}"#);
        assert_eq!(grant_shape.message(400), "bad creds");

        let msg_shape = ErrorBody::parse(r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#);
        assert!(msg_shape.is_duplicate_signup());

        let garbage = ErrorBody::parse("not json at all");
        assert_eq!(garbage.message(500), "HTTP 500");
    }

    #[test]
    fn statuses_map_to_the_taxonomy() {
        let body = ErrorBody::default();
        assert_eq!(map_auth_error(400, &body), AuthError::InvalidCredentials);
        assert_eq!(map_auth_error(401, &body), AuthError::InvalidCredentials);
        assert_eq!(map_auth_error(403, &body), AuthError::AccountDisabled);
        assert_eq!(map_auth_error(429, &body), AuthError::RateLimit);
        assert!(matches!(map_auth_error(500, &body), AuthError::Backend(_)));
    }
}
