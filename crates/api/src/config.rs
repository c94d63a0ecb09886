//! Tenant configuration
//!
//! Each hosting application declares which tenant it is; the tenant fixes the
//! storage namespace, the expected role, and the login path. Loaded from a
//! TOML file with environment overrides for deploy-time secrets.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stayport_domain::UserRole;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: Box<toml::de::Error> },

    #[error("missing backend api key (set STAYPORT_API_KEY or [backend] api_key)")]
    MissingApiKey,
}

/// The four front-end shells sharing the identity backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tenant {
    Admin,
    Customer,
    Hotel,
    Staff,
}

impl Tenant {
    /// Storage namespace segment; isolation between shells is a hard
    /// requirement
    #[must_use]
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
            Self::Hotel => "hotel",
            Self::Staff => "staff",
        }
    }

    /// Role this shell admits
    #[must_use]
    pub fn expected_role(&self) -> UserRole {
        match self {
            Self::Admin => UserRole::Admin,
            Self::Customer => UserRole::Customer,
            Self::Hotel => UserRole::Hotel,
            Self::Staff => UserRole::Staff,
        }
    }
}

/// Identity service connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-deployment secret for synthetic credential derivation
    #[serde(default)]
    pub link_pepper: String,
    /// Domain for synthetic account emails
    #[serde(default = "default_link_email_domain")]
    pub link_email_domain: String,
}

fn default_link_email_domain() -> String {
    "identities.stayport.app".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

/// Full configuration for one hosting application
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub tenant: Tenant,
    pub backend: BackendSettings,
    /// Directory for the durable key/value store
    pub storage_dir: PathBuf,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl TenantConfig {
    /// Load from a TOML file, then apply environment overrides
    /// (`STAYPORT_BACKEND_URL`, `STAYPORT_API_KEY`, `STAYPORT_LINK_PEPPER`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config: Self = toml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source: Box::new(source) })?;
        config.apply_env_overrides();
        if config.backend.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        // .env is optional; ignore a missing file.
        let _ = dotenvy::dotenv();
        if let Ok(url) = std::env::var("STAYPORT_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Ok(key) = std::env::var("STAYPORT_API_KEY") {
            self.backend.api_key = key;
        }
        if let Ok(pepper) = std::env::var("STAYPORT_LINK_PEPPER") {
            self.backend.link_pepper = pepper;
        }
    }

    /// Path of this tenant's durable store file
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}-store.json", self.tenant.namespace()))
    }
}
