use crate::error::{OtpError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub otp: OtpConfig,
    pub hashing: HashConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Number of digits in an issued code
    pub code_length: u32,
    /// Lifetime of an issued code in seconds
    pub ttl_secs: u64,
}

/// Argon2id cost parameters used to hash issued codes
///
/// Six digits is a tiny search space, so the cost has to make offline
/// guessing expensive while keeping `issue`/`validate` latency tolerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HashConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub send: RateLimitPolicy,
    pub validate: RateLimitPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitPolicy {
    pub max_attempts: u64,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: String,
    /// Maximum time to wait for a pooled connection
    pub timeout_secs: u64,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OtpError::Config(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| OtpError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if !(4..=10).contains(&self.otp.code_length) {
            return Err(OtpError::Config(format!(
                "otp.code_length must be between 4 and 10, got {}",
                self.otp.code_length
            )));
        }

        if self.otp.ttl_secs == 0 {
            return Err(OtpError::Config("otp.ttl_secs must be positive".to_string()));
        }

        self.hashing.params()?;

        for (name, policy) in [
            ("send", &self.rate_limit.send),
            ("validate", &self.rate_limit.validate),
        ] {
            if policy.max_attempts == 0 || policy.window_secs == 0 {
                return Err(OtpError::Config(format!(
                    "rate_limit.{} needs non-zero max_attempts and window_secs",
                    name
                )));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(OtpError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                other
            ))),
        }
    }
}

impl OtpConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl_secs: 600, // 10 minutes
        }
    }
}

impl HashConfig {
    /// Build Argon2 parameters, failing on out-of-range costs
    pub fn params(&self) -> Result<argon2::Params> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| OtpError::Config(format!("invalid hashing parameters: {}", e)))
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            send: RateLimitPolicy {
                max_attempts: 5,
                window_secs: 60,
            },
            validate: RateLimitPolicy {
                max_attempts: 5,
                window_secs: 60,
            },
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://otp.db?mode=rwc".to_string(),
            timeout_secs: 5,
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
