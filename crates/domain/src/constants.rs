//! Application constants
//!
//! Centralized location for all domain-level constants used by the session
//! core.

/// Cached profile snapshots older than this are revalidated against the
/// backend before being trusted.
pub const PROFILE_CACHE_TTL_MS: i64 = 5 * 60 * 1000;

/// Hard ceiling for the bootstrap profile fetch. A bootstrap that has not
/// resolved by then reports a timeout and leaves the stored session in place.
pub const BOOTSTRAP_TIMEOUT_SECS: u64 = 10;

/// Window after a completed fetch during which duplicate mount effects are
/// absorbed instead of triggering a second fetch.
pub const FETCH_DEBOUNCE_MS: u64 = 100;

/// How long a blocked fetch caller waits before its single re-check.
pub const FETCH_RETRY_DELAY_MS: u64 = 50;

// Storage key suffixes. Every key is prefixed with
// `{STORAGE_NAMESPACE_PREFIX}.{tenant}.` so two shells never share an entry.
pub const STORAGE_NAMESPACE_PREFIX: &str = "stayport";
pub const KEY_SESSION: &str = "session";
pub const KEY_PROFILE_CACHE: &str = "profile_cache";
pub const KEY_REMEMBER_ME: &str = "remember_me";
pub const KEY_SESSION_ONLY: &str = "session_only";
