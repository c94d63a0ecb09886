//! External identity linking
//!
//! Reconciles a third-party chat-platform identity with a backend profile,
//! including the duplicate-record races created by asynchronous backend
//! triggers: a trigger-driven self-signup record and an
//! administrator-provisioned invite record can both end up pointing at the
//! same account, and repeated link attempts must converge to exactly one.

pub mod credentials;

use std::sync::Arc;

use chrono::Utc;
use stayport_domain::{
    AccountStatus, AuthError, InviteRecord, LinkRequest, Profile, ProfileChanges, Result, Session,
    UserRole,
};
use tracing::{debug, info, warn};

use crate::auth::ports::{
    IdentityBackend, InsertOutcome, SignInOutcome, SignUpMetadata, SignUpOutcome,
};
use credentials::SyntheticCredentials;

/// Configuration for the linker
#[derive(Debug, Clone)]
pub struct LinkerConfig {
    /// Per-deployment secret mixed into derived credentials
    pub pepper: String,
    /// Domain for synthetic account emails
    pub email_domain: String,
    /// Role assigned to accounts created through this path
    pub role: UserRole,
}

/// Result of a successful external-identity sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedSignIn {
    pub profile: Profile,
    pub session: Session,
}

/// Links external chat-platform identities to backend profiles
pub struct ExternalIdentityLinker {
    backend: Arc<dyn IdentityBackend>,
    config: LinkerConfig,
}

impl ExternalIdentityLinker {
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>, config: LinkerConfig) -> Self {
        Self { backend, config }
    }

    /// Sign in with an external identity, creating the backend account on
    /// first contact.
    ///
    /// Idempotent: repeating the same `(external_id, invite_record_id)` call
    /// after a partial failure converges to exactly one linked record and
    /// never leaves two active records referencing the same account.
    pub async fn login_or_create(&self, request: &LinkRequest) -> Result<LinkedSignIn> {
        let creds = SyntheticCredentials::derive(
            &request.external_id,
            &self.config.pepper,
            &self.config.email_domain,
        );

        match self.backend.sign_in_with_password(&creds.email, &creds.password).await {
            Ok(outcome) => self.returning_user(outcome, request).await,
            Err(AuthError::InvalidCredentials) => self.create_account(&creds, request).await,
            Err(err) => Err(err),
        }
    }

    /// Attach an external identity to the currently-authenticated account.
    ///
    /// Rejects with `IdentityAlreadyLinked` when the identity is attached to
    /// a different account; linking the same identity twice is a no-op.
    pub async fn link_to_current(&self, user_id: &str, external_id: &str) -> Result<()> {
        if self.backend.get_session().await.is_none() {
            return Err(AuthError::Unknown("no active session to link against".into()));
        }

        if let Some(record) = self.backend.find_invite_by_external_id(external_id).await? {
            return match record.owner_ref.as_deref() {
                Some(owner) if owner == user_id => Ok(()),
                Some(_) => Err(AuthError::IdentityAlreadyLinked),
                None => {
                    if self.backend.claim_invite(&record.id, user_id).await? {
                        Ok(())
                    } else {
                        // Lost a concurrent claim on the same record.
                        Err(AuthError::IdentityAlreadyLinked)
                    }
                }
            };
        }

        match self.backend.find_invite_by_owner(user_id).await? {
            Some(own_record) => {
                self.backend.set_invite_external_id(&own_record.id, external_id).await
            }
            None => Err(AuthError::OrphanedIdentity),
        }
    }

    // ------------------------------------------------------------------
    // Sign-in succeeded: returning user
    // ------------------------------------------------------------------

    async fn returning_user(
        &self,
        outcome: SignInOutcome,
        request: &LinkRequest,
    ) -> Result<LinkedSignIn> {
        let user_id = outcome.user_id.clone();
        debug!(user_id = %user_id, "External identity resolved to an existing account");

        let mut profile = match self.backend.fetch_profile(&user_id).await? {
            Some(profile) => profile,
            None => self.provision_profile(&user_id, request).await?,
        };

        let linked_record = self.backend.find_invite_by_owner(&user_id).await?;

        if let Some(invite_id) = &request.invite_record_id {
            let canonical_name = self.reconcile_invite(&user_id, invite_id, linked_record).await?;
            if let Some(name) = canonical_name {
                if name != profile.full_name {
                    self.backend
                        .update_profile(
                            &user_id,
                            &ProfileChanges { full_name: Some(name.clone()), avatar_url: None },
                        )
                        .await?;
                    profile.full_name = name;
                }
            }
        } else if linked_record.is_none() {
            // No administrator-curated record owns this account: refresh the
            // display name and avatar from the external identity.
            let changes = ProfileChanges {
                full_name: (profile.full_name != request.display_name)
                    .then(|| request.display_name.clone()),
                avatar_url: request
                    .picture_url
                    .as_ref()
                    .filter(|url| profile.avatar_url.as_ref() != Some(url))
                    .cloned(),
            };
            if !changes.is_empty() {
                self.backend.update_profile(&user_id, &changes).await?;
                if let Some(name) = changes.full_name {
                    profile.full_name = name;
                }
                if let Some(url) = changes.avatar_url {
                    profile.avatar_url = Some(url);
                }
            }
        }
        // An administrator-managed record with its own name wins: a returning
        // user's chat nickname never overwrites a curated identity.

        Ok(LinkedSignIn { profile, session: outcome.session })
    }

    // ------------------------------------------------------------------
    // Sign-in failed: first contact, create the account
    // ------------------------------------------------------------------

    async fn create_account(
        &self,
        creds: &SyntheticCredentials,
        request: &LinkRequest,
    ) -> Result<LinkedSignIn> {
        let metadata = SignUpMetadata {
            role: Some(self.config.role),
            full_name: Some(request.display_name.clone()),
            external_id: Some(request.external_id.clone()),
            invite_record_id: request.invite_record_id.clone(),
        };

        let outcome = match self.backend.sign_up(&creds.email, &creds.password, metadata).await? {
            SignUpOutcome::Created(outcome) => outcome,
            SignUpOutcome::AlreadyExists => {
                // Benign race with a concurrent login, or a secret that no
                // longer matches. Retrying sign-in with a possibly mismatched
                // secret is unrecoverable without an administrator, so this
                // fails closed with a distinct, non-retryable error.
                return match self.backend.find_profile_by_email(&creds.email).await? {
                    Some(_) => Err(AuthError::AccountExistsPasswordMismatch),
                    None => Err(AuthError::OrphanedIdentity),
                };
            }
        };

        let user_id = outcome.user_id.clone();
        info!(user_id = %user_id, "Created backend account for external identity");

        let mut profile = match self.backend.fetch_profile(&user_id).await? {
            Some(profile) => profile,
            None => self.provision_profile(&user_id, request).await?,
        };

        if let Some(invite_id) = &request.invite_record_id {
            // Verify, rather than assume, that the backend trigger performed
            // the linkage; trigger lag and trigger-created self-signup
            // records are both handled by the same reconciliation.
            let trigger_linked = self
                .backend
                .find_invite_by_id(invite_id)
                .await?
                .is_some_and(|record| record.is_owned_by(&user_id));

            let canonical_name = if trigger_linked {
                self.backend.find_invite_by_id(invite_id).await?.map(|record| record.name)
            } else {
                debug!(invite_id = %invite_id, "Backend trigger did not link the invite, reconciling manually");
                let linked_record = self.backend.find_invite_by_owner(&user_id).await?;
                self.reconcile_invite(&user_id, invite_id, linked_record).await?
            };

            if let Some(name) = canonical_name {
                if name != profile.full_name {
                    self.backend
                        .update_profile(
                            &user_id,
                            &ProfileChanges { full_name: Some(name.clone()), avatar_url: None },
                        )
                        .await?;
                    profile.full_name = name;
                }
            }
        }

        Ok(LinkedSignIn { profile, session: outcome.session })
    }

    // ------------------------------------------------------------------
    // Shared reconciliation
    // ------------------------------------------------------------------

    /// Converge on the invited record: remove any different record already
    /// linked to this account (a trigger-created duplicate), then claim the
    /// invited record if it is still unclaimed.
    ///
    /// Returns the invited record's canonical name to propagate onto the
    /// profile, or `None` when the record no longer exists.
    async fn reconcile_invite(
        &self,
        user_id: &str,
        invite_id: &str,
        linked_record: Option<InviteRecord>,
    ) -> Result<Option<String>> {
        let already_ours = match &linked_record {
            Some(record) if record.id == invite_id => true,
            Some(duplicate) => {
                // Trigger-driven signup created its own record for the same
                // account; delete it, scoped by ownership.
                info!(duplicate_id = %duplicate.id, invite_id = %invite_id, "Removing duplicate record before claiming invite");
                self.backend.delete_invite(&duplicate.id, user_id).await?;
                false
            }
            None => false,
        };

        if !already_ours && !self.backend.claim_invite(invite_id, user_id).await? {
            // Claim failed: acceptable only if a previous attempt of ours
            // already claimed it (idempotent retry).
            match self.backend.find_invite_by_id(invite_id).await? {
                Some(record) if record.is_owned_by(user_id) => {}
                Some(_) => return Err(AuthError::IdentityAlreadyLinked),
                None => return Err(AuthError::OrphanedIdentity),
            }
        }

        Ok(self.backend.find_invite_by_id(invite_id).await?.map(|record| record.name))
    }

    /// Insert the profile row for an account whose trigger has not created
    /// one yet; a duplicate key means the trigger won the race after all.
    async fn provision_profile(&self, user_id: &str, request: &LinkRequest) -> Result<Profile> {
        let creds = SyntheticCredentials::derive(
            &request.external_id,
            &self.config.pepper,
            &self.config.email_domain,
        );
        let now = Utc::now();
        let profile = Profile {
            id: user_id.to_string(),
            email: creds.email,
            role: self.config.role,
            full_name: request.display_name.clone(),
            phone: None,
            avatar_url: request.picture_url.clone(),
            status: AccountStatus::Active,
            language: "en".into(),
            created_at: now,
            updated_at: now,
        };

        match self.backend.insert_profile(&profile).await? {
            InsertOutcome::Inserted => Ok(profile),
            InsertOutcome::DuplicateKey => {
                warn!(user_id = %user_id, "Profile appeared while provisioning, fetching existing row");
                self.backend.fetch_profile(user_id).await?.ok_or_else(|| {
                    AuthError::Backend("profile missing after duplicate-key insert".into())
                })
            }
        }
    }
}
