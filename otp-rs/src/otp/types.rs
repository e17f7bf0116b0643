//! OTP types and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeliveryError;

/// Outstanding code for a principal, as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Subject the code was issued for
    pub principal_id: String,
    /// Argon2id PHC string of the code
    pub code_hash: String,
    /// When the code was issued
    pub issued_at: DateTime<Utc>,
    /// When the code stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Freshly issued code, handed to the caller for delivery
///
/// The plaintext never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCode {
    code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCode {
    pub(crate) fn new(code: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            code,
            issued_at,
            expires_at,
        }
    }

    /// The plaintext code
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }
}

impl fmt::Debug for IssuedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCode")
            .field("code", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of validating a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Code matched and has been consumed
    Valid,
    /// A code is outstanding but the submitted value is wrong
    Invalid,
    /// Nothing to check against: never issued, already used, or timed out
    Expired,
    /// Too many failed attempts in the current window
    RateLimited,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid => write!(f, "valid"),
            ValidationOutcome::Invalid => write!(f, "invalid"),
            ValidationOutcome::Expired => write!(f, "expired"),
            ValidationOutcome::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// What happened when the issued code was handed to the delivery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The code was issued and stays valid, but did not reach the user
    Failed(DeliveryError),
}

/// Result of a code request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new code is outstanding
    Issued {
        expires_at: DateTime<Utc>,
        delivery: DeliveryStatus,
    },
    /// Too many code requests in the current window; nothing was issued
    RateLimited,
}
