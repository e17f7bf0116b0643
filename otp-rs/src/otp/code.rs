//! Code generation and hashing
//!
//! Codes come from the OS CSPRNG. Hashes are Argon2id PHC strings; both
//! hashing and verification are CPU-bound and run on the blocking pool.

use argon2::{
    password_hash::{
        self, rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, Rng};

use crate::config::HashConfig;
use crate::error::{OtpError, Result};

/// Longest code that still fits in a `u64`
const MAX_CODE_LENGTH: u32 = 19;

/// Generate a numeric code of exactly `length` digits
///
/// The leading digit is never zero, so the code keeps its width whatever
/// way the caller stores or renders it. `length` is clamped to `1..=19`.
pub fn generate_code(length: u32) -> String {
    let length = length.clamp(1, MAX_CODE_LENGTH);
    let low = 10u64.pow(length - 1);
    let high = low * 10 - 1;

    OsRng.gen_range(low..=high).to_string()
}

/// Argon2id hasher for issued codes
#[derive(Debug, Clone)]
pub struct CodeHasher {
    params: Params,
}

impl CodeHasher {
    pub fn new(config: &HashConfig) -> Result<Self> {
        Ok(Self {
            params: config.params()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a code with a fresh random salt
    pub fn hash_blocking(&self, code: &str) -> Result<String> {
        let salt = SaltString::generate(&mut SaltRng);

        let hash = self
            .argon2()
            .hash_password(code.as_bytes(), &salt)
            .map_err(|e| OtpError::Hash(format!("Failed to hash code: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Check a code against a stored hash
    ///
    /// The cost parameters are read from the hash itself, and the final
    /// output comparison is constant-time.
    pub fn verify_blocking(&self, code: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| OtpError::Hash(format!("Malformed code hash: {}", e)))?;

        match self.argon2().verify_password(code.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(OtpError::Hash(format!("Failed to verify code: {}", e))),
        }
    }

    pub async fn hash(&self, code: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&code))
            .await
            .map_err(|e| OtpError::Hash(format!("Hashing task failed: {}", e)))?
    }

    pub async fn verify(&self, code: String, hash: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&code, &hash))
            .await
            .map_err(|e| OtpError::Hash(format!("Verification task failed: {}", e)))?
    }
}
