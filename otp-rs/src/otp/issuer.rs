//! Code issuance
//!
//! Generates a code, stores its hash under the principal's key with the
//! configured TTL and hands the plaintext back for delivery. Issuing again
//! overwrites the previous record, so only the newest code is accepted.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::code::{generate_code, CodeHasher};
use super::locks::PrincipalLocks;
use super::types::{IssuedCode, OtpRecord};
use crate::clock::{expiry_after, Clock};
use crate::config::Config;
use crate::error::Result;
use crate::store::{code_key, Store};

pub struct CodeIssuer {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    hasher: CodeHasher,
    locks: Arc<PrincipalLocks>,
    code_length: u32,
    ttl: Duration,
}

impl CodeIssuer {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        locks: Arc<PrincipalLocks>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            clock,
            hasher: CodeHasher::new(&config.hashing)?,
            locks,
            code_length: config.otp.code_length,
            ttl: config.otp.ttl(),
        })
    }

    /// Issue a fresh code for `principal_id`
    ///
    /// Performs exactly one store write. If it fails nothing was stored and
    /// any previous code is still the outstanding one.
    pub async fn issue(&self, principal_id: &str) -> Result<IssuedCode> {
        let code = generate_code(self.code_length);
        let code_hash = self.hasher.hash(code.clone()).await?;

        let _guard = self.locks.lock(principal_id).await;

        let issued_at = self.clock.now();
        let record = OtpRecord {
            principal_id: principal_id.to_string(),
            code_hash,
            issued_at,
            expires_at: expiry_after(issued_at, self.ttl),
        };

        let value = serde_json::to_vec(&record)?;
        self.store
            .put(&code_key(principal_id), &value, self.ttl)
            .await?;

        info!(
            "Issued code for {} (expires at {})",
            principal_id, record.expires_at
        );

        Ok(IssuedCode::new(code, record.issued_at, record.expires_at))
    }

    /// Withdraw the outstanding code, if any
    ///
    /// Returns `true` when a live code was removed.
    pub async fn revoke(&self, principal_id: &str) -> Result<bool> {
        let _guard = self.locks.lock(principal_id).await;

        let removed = self
            .store
            .get_and_delete(&code_key(principal_id))
            .await?
            .is_some();

        debug!("Revoke for {}: removed={}", principal_id, removed);
        Ok(removed)
    }
}
