//! Deterministic synthetic credentials
//!
//! The chat-platform login path has no password of its own, so each external
//! identity maps to a synthetic backend credential pair derived from its
//! stable id. The same external identity always resolves to the same backend
//! account; the secret never leaves the client and is never shown to anyone.

use sha2::{Digest, Sha256};

/// Synthetic email/secret pair for one external identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticCredentials {
    pub email: String,
    pub password: String,
}

impl SyntheticCredentials {
    /// Derive the credential pair for an external identity.
    ///
    /// The email local part is a truncated digest of the external id (stable,
    /// collision-resistant enough at this population size, and free of
    /// platform-specific characters); the secret mixes in a per-deployment
    /// pepper so leaked external ids alone cannot reconstruct it.
    #[must_use]
    pub fn derive(external_id: &str, pepper: &str, email_domain: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"stayport.identity.v1:");
        hasher.update(external_id.as_bytes());
        let id_digest = hex::encode(hasher.finalize());

        let mut hasher = Sha256::new();
        hasher.update(pepper.as_bytes());
        hasher.update(b":");
        hasher.update(external_id.as_bytes());
        let secret_digest = hex::encode(hasher.finalize());

        Self {
            email: format!("ext-{}@{email_domain}", &id_digest[..24]),
            password: secret_digest,
        }
    }
}
