//! # Stayport Infra
//!
//! Infrastructure adapters for the session core:
//! - [`identity`]: HTTP implementation of the `IdentityBackend` port
//!   (GoTrue-style auth endpoints + PostgREST-style row API)
//! - [`storage`]: file-backed durable key/value store
//!
//! All adapters map transport failures into the domain error taxonomy at the
//! boundary; nothing above this crate sees a `reqwest` or I/O error type.

pub mod identity;
pub mod storage;

pub use identity::{BackendConfig, HttpIdentityBackend};
pub use storage::FileKeyValueStore;
