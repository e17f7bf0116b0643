//! Fixed-window rate limiting on top of a [`Store`]
//!
//! Counters are kept in the store under operation-scoped keys, so
//! exhausting the "send" budget never blocks validation and vice versa.
//! A window starts with the first hit and ends when the counter's TTL
//! runs out; nothing here runs a cleanup task.
//!
//! # Example
//! ```no_run
//! use otp_rs::rate_limit::{RateLimiter, ThrottleAction};
//! use otp_rs::store::MemoryStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> otp_rs::Result<()> {
//! let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
//! let key = ThrottleAction::Send.key("user-42");
//!
//! if limiter.check_and_hit(&key, 5, Duration::from_secs(60)).await? {
//!     println!("Request allowed");
//! } else {
//!     println!("Rate limit exceeded");
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{throttle_key, Store};

/// Operations that are throttled independently per principal
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ThrottleAction {
    /// Requesting a new code
    Send,
    /// Submitting a code for validation
    Validate,
}

impl ThrottleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleAction::Send => "send",
            ThrottleAction::Validate => "validate",
        }
    }

    /// Store key of this action's counter for `principal_id`
    pub fn key(&self, principal_id: &str) -> String {
        throttle_key(self.as_str(), principal_id)
    }
}

impl fmt::Display for ThrottleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempt counter shared by the issuer and the validator
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Count an attempt unless the window is already exhausted
    ///
    /// # Returns
    /// - `true` if the attempt is allowed (and was counted)
    /// - `false` once `max_attempts` hits were recorded in the current window
    pub async fn check_and_hit(
        &self,
        key: &str,
        max_attempts: u64,
        window: Duration,
    ) -> Result<bool> {
        if self.too_many_attempts(key, max_attempts).await? {
            return Ok(false);
        }

        let count = self.hit(key, window).await?;
        Ok(count <= max_attempts)
    }

    /// Whether the current window already holds `max_attempts` hits
    pub async fn too_many_attempts(&self, key: &str, max_attempts: u64) -> Result<bool> {
        let attempts = self.store.count(key).await?;

        if attempts >= max_attempts {
            warn!("Rate limit exceeded for {}: {} of {}", key, attempts, max_attempts);
            return Ok(true);
        }

        Ok(false)
    }

    /// Record one attempt, opening a new window if none is live
    pub async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let count = self.store.increment(key, window).await?;
        debug!("Attempt {} recorded for {}", count, key);
        Ok(count)
    }

    /// Attempts recorded in the current window
    pub async fn attempts(&self, key: &str) -> Result<u64> {
        self.store.count(key).await
    }

    /// Forget all attempts for `key`
    pub async fn clear(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        debug!("Reset rate limit for {}", key);
        Ok(())
    }
}
