//! HTTP identity backend
//!
//! Implements the `IdentityBackend` port against the identity service's
//! GoTrue-style auth endpoints (`/auth/v1/*`) and PostgREST-style row API
//! (`/rest/v1/*`). Conditional invite claim/delete are expressed as filtered
//! PATCH/DELETE requests so the unclaimed/ownership guards hold server-side
//! under concurrency.

pub mod wire;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use stayport_core::{IdentityBackend, InsertOutcome, SignInOutcome, SignUpMetadata, SignUpOutcome};
use stayport_domain::{
    AuthError, AuthEvent, InviteRecord, Profile, ProfileChanges, Result, Session,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use wire::{
    map_auth_error, map_transport_error, ErrorBody, SignUpBody, SignUpData, TokenGrantResponse,
};

const PROFILES_TABLE: &str = "profiles";
const INVITES_TABLE: &str = "staff_invites";

/// Connection settings for the identity service
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Service root, e.g. `https://identity.stayport.app`
    pub base_url: String,
    /// Publishable API key sent with every request
    pub api_key: String,
}

/// HTTP implementation of the identity backend port
pub struct HttpIdentityBackend {
    config: BackendConfig,
    http: Client,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpIdentityBackend {
    /// Create a client for the given service
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        let (events, _) = broadcast::channel(32);
        Self { config, http, session: RwLock::new(None), events }
    }

    /// Adopt a session restored from storage so row-API calls authenticate
    /// as the user
    pub fn restore_session(&self, session: Session) {
        *self.session.write() = Some(session);
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    /// Bearer token for row-API calls: the user's access token when a
    /// session is held, the publishable key otherwise
    fn bearer(&self) -> String {
        self.session
            .read()
            .as_ref()
            .map_or_else(|| self.config.api_key.clone(), |s| s.access_token.clone())
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::auth_error_from(response).await);
        }

        let grant: TokenGrantResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Backend(format!("failed to parse token response: {err}")))?;
        let session = grant.into_session();
        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    async fn auth_error_from(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        map_auth_error(status, &ErrorBody::parse(&raw))
    }

    async fn rest_error_from(response: Response) -> AuthError {
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        match status.as_u16() {
            429 => AuthError::RateLimit,
            _ => AuthError::Backend(ErrorBody::parse(&raw).message(status.as_u16())),
        }
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filter: (&str, String),
    ) -> Result<Vec<T>> {
        let response = self
            .http
            .get(self.rest_url(table))
            .query(&[(filter.0, filter.1.as_str()), ("select", "*")])
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::rest_error_from(response).await);
        }
        response
            .json()
            .await
            .map_err(|err| AuthError::Backend(format!("failed to parse rows: {err}")))
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        debug!(email = %email, "Password sign-in");
        let session = self
            .token_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await?;
        let user_id = session.user_id.clone();
        self.emit(AuthEvent::SignedIn { user_id: user_id.clone(), session: session.clone() });
        info!(user_id = %user_id, "Signed in");
        Ok(SignInOutcome { user_id, session })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome> {
        let body = SignUpBody {
            email,
            password,
            data: SignUpData {
                role: metadata.role,
                full_name: metadata.full_name,
                external_id: metadata.external_id,
                invite_record_id: metadata.invite_record_id,
            },
        };
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();
            let error_body = ErrorBody::parse(&raw);
            if error_body.is_duplicate_signup() {
                return Ok(SignUpOutcome::AlreadyExists);
            }
            return Err(map_auth_error(status, &error_body));
        }

        let grant: TokenGrantResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Backend(format!("failed to parse signup response: {err}")))?;
        let session = grant.into_session();
        *self.session.write() = Some(session.clone());
        let user_id = session.user_id.clone();
        self.emit(AuthEvent::SignedIn { user_id: user_id.clone(), session: session.clone() });
        info!(user_id = %user_id, "Account created");
        Ok(SignUpOutcome::Created(SignInOutcome { user_id, session }))
    }

    async fn sign_out(&self) -> Result<()> {
        let bearer = self.bearer();
        // The local scope is dropped and the event emitted regardless of the
        // network outcome: the user asked to leave.
        *self.session.write() = None;
        self.emit(AuthEvent::SignedOut);

        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            warn!(status = %response.status(), "Backend rejected sign-out");
            return Err(Self::auth_error_from(response).await);
        }
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let result = self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await;
        match result {
            Ok(session) => {
                self.emit(AuthEvent::TokenRefreshed {
                    user_id: session.user_id.clone(),
                    session: session.clone(),
                });
                Ok(session)
            }
            Err(err) => {
                self.emit(AuthEvent::TokenRefreshFailed);
                Err(err)
            }
        }
    }

    async fn get_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    fn clear_local_session(&self) {
        *self.session.write() = None;
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> =
            self.fetch_rows(PROFILES_TABLE, ("id", format!("eq.{user_id}"))).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> =
            self.fetch_rows(PROFILES_TABLE, ("email", format!("eq.{email}"))).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<InsertOutcome> {
        let response = self
            .http
            .post(self.rest_url(PROFILES_TABLE))
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer())
            .json(&[profile])
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        match response.status() {
            StatusCode::CONFLICT => Ok(InsertOutcome::DuplicateKey),
            status if status.is_success() => Ok(InsertOutcome::Inserted),
            _ => Err(Self::rest_error_from(response).await),
        }
    }

    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let response = self
            .http
            .patch(self.rest_url(PROFILES_TABLE))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer())
            .json(changes)
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::rest_error_from(response).await);
        }
        Ok(())
    }

    async fn find_invite_by_id(&self, id: &str) -> Result<Option<InviteRecord>> {
        let rows: Vec<InviteRecord> =
            self.fetch_rows(INVITES_TABLE, ("id", format!("eq.{id}"))).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_invite_by_owner(&self, owner_ref: &str) -> Result<Option<InviteRecord>> {
        let rows: Vec<InviteRecord> =
            self.fetch_rows(INVITES_TABLE, ("owner_ref", format!("eq.{owner_ref}"))).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_invite_by_external_id(&self, external_id: &str) -> Result<Option<InviteRecord>> {
        let rows: Vec<InviteRecord> =
            self.fetch_rows(INVITES_TABLE, ("external_id", format!("eq.{external_id}"))).await?;
        Ok(rows.into_iter().next())
    }

    async fn claim_invite(&self, id: &str, owner_ref: &str) -> Result<bool> {
        // Filtered PATCH: only an unclaimed row is updated, so two
        // concurrent claims cannot both win.
        let response = self
            .http
            .patch(self.rest_url(INVITES_TABLE))
            .query(&[("id", format!("eq.{id}")), ("owner_ref", "is.null".to_string())])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&serde_json::json!({ "owner_ref": owner_ref }))
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::rest_error_from(response).await);
        }
        let rows: Vec<InviteRecord> = response
            .json()
            .await
            .map_err(|err| AuthError::Backend(format!("failed to parse claim result: {err}")))?;
        Ok(!rows.is_empty())
    }

    async fn set_invite_external_id(&self, id: &str, external_id: &str) -> Result<()> {
        let response = self
            .http
            .patch(self.rest_url(INVITES_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer())
            .json(&serde_json::json!({ "external_id": external_id }))
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::rest_error_from(response).await);
        }
        Ok(())
    }

    async fn delete_invite(&self, id: &str, owner_ref: &str) -> Result<()> {
        // Ownership-scoped: the filter guarantees a record this account does
        // not own is never deleted.
        let response = self
            .http
            .delete(self.rest_url(INVITES_TABLE))
            .query(&[("id", format!("eq.{id}")), ("owner_ref", format!("eq.{owner_ref}"))])
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|err| map_transport_error(&err))?;

        if !response.status().is_success() {
            return Err(Self::rest_error_from(response).await);
        }
        Ok(())
    }
}
