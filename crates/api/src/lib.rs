//! # Stayport App
//!
//! Composition root and application-facing surface of the session core.
//! Each front-end shell (admin, customer, hotel, staff) builds one
//! [`AppContext`] from its [`TenantConfig`] and hands the [`AuthHandle`] to
//! its UI layer.

pub mod config;
pub mod context;
pub mod guard;
pub mod handle;
pub mod telemetry;

pub use config::{BackendSettings, ConfigError, Tenant, TenantConfig};
pub use context::AppContext;
pub use guard::{RouteDecision, RouteGuard};
pub use handle::AuthHandle;
pub use telemetry::init_tracing;
