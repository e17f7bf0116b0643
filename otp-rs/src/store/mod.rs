//! Key-value storage with per-key TTL
//!
//! The engine keeps all durable state behind the [`Store`] trait. Keys are
//! namespaced strings built by [`code_key`] and [`throttle_key`] so records
//! and attempt counters never collide.
//!
//! - [`memory`]: in-process store, expiry driven by an injected clock
//! - [`sqlite`]: SQLite-backed store via sqlx

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key prefix shared by every key this crate writes
pub const KEY_PREFIX: &str = "otp";

/// Storage operations consumed by the issuer, validator and rate limiter
///
/// Every operation must be atomic per key. Expired entries must read as
/// absent even if the backend has not purged them yet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Write `value` under `key`, replacing any previous value and TTL
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Read a live value
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a value or counter; missing keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove a live value and return what was removed
    async fn get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the value only if it still equals `expected`
    ///
    /// Returns `true` when this call removed it.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool>;

    /// Increment a counter and return the new count
    ///
    /// A missing or expired counter starts again at 1 with a fresh `ttl`;
    /// a live counter keeps its original expiry.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Current value of a live counter, 0 when absent
    async fn count(&self, key: &str) -> Result<u64>;
}

/// Key holding the outstanding code for a principal
pub fn code_key(principal_id: &str) -> String {
    format!("{}:code:{}", KEY_PREFIX, principal_id)
}

/// Key holding the attempt counter for a principal and operation
pub fn throttle_key(action: &str, principal_id: &str) -> String {
    format!("{}:throttle:{}:{}", KEY_PREFIX, action, principal_id)
}
