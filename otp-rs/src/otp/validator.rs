//! Code validation
//!
//! Order of checks for a submitted code:
//! 1. attempt throttle (no store read when exceeded), checked again once the
//!    principal lock is held
//! 2. outstanding record lookup
//! 3. constant-time hash verification
//! 4. atomic consume on match, attempt counted on mismatch

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::code::CodeHasher;
use super::locks::PrincipalLocks;
use super::types::{OtpRecord, ValidationOutcome};
use crate::clock::Clock;
use crate::config::{Config, RateLimitPolicy};
use crate::error::Result;
use crate::rate_limit::{RateLimiter, ThrottleAction};
use crate::store::{code_key, Store};

pub struct CodeValidator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    hasher: CodeHasher,
    limiter: RateLimiter,
    locks: Arc<PrincipalLocks>,
    policy: RateLimitPolicy,
}

impl CodeValidator {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        locks: Arc<PrincipalLocks>,
    ) -> Result<Self> {
        Ok(Self {
            limiter: RateLimiter::new(Arc::clone(&store)),
            store,
            clock,
            hasher: CodeHasher::new(&config.hashing)?,
            locks,
            policy: config.rate_limit.validate,
        })
    }

    /// Validate `submitted` against the outstanding code for `principal_id`
    ///
    /// A matching code is consumed: a second call with the same code reports
    /// [`ValidationOutcome::Expired`].
    pub async fn validate(&self, principal_id: &str, submitted: &str) -> Result<ValidationOutcome> {
        let throttle_key = ThrottleAction::Validate.key(principal_id);

        if self
            .limiter
            .too_many_attempts(&throttle_key, self.policy.max_attempts)
            .await?
        {
            return Ok(ValidationOutcome::RateLimited);
        }

        let _guard = self.locks.lock(principal_id).await;

        // Callers queued on the lock may have pushed the counter over the limit
        if self
            .limiter
            .too_many_attempts(&throttle_key, self.policy.max_attempts)
            .await?
        {
            return Ok(ValidationOutcome::RateLimited);
        }

        let key = code_key(principal_id);
        let Some(raw) = self.store.get(&key).await? else {
            debug!("No outstanding code for {}", principal_id);
            return Ok(ValidationOutcome::Expired);
        };

        let record: OtpRecord = serde_json::from_slice(&raw)?;
        if record.is_expired(self.clock.now()) {
            debug!("Outstanding code for {} expired at {}", principal_id, record.expires_at);
            return Ok(ValidationOutcome::Expired);
        }

        let matches = self
            .hasher
            .verify(submitted.trim().to_string(), record.code_hash)
            .await?;

        if !matches {
            let attempts = self.limiter.hit(&throttle_key, self.policy.window()).await?;
            warn!(
                "Invalid code for {} (attempt {} of {})",
                principal_id, attempts, self.policy.max_attempts
            );
            return Ok(ValidationOutcome::Invalid);
        }

        // Only the exact record that was verified may be consumed
        if !self.store.compare_and_delete(&key, &raw).await? {
            debug!("Code for {} was consumed or replaced concurrently", principal_id);
            return Ok(ValidationOutcome::Expired);
        }

        self.limiter.clear(&throttle_key).await?;
        info!("Code consumed for {}", principal_id);

        Ok(ValidationOutcome::Valid)
    }
}
