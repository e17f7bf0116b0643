//! otp-rs: one-time passcode engine
//!
//! Issues, stores and validates short-lived numeric codes used as a second
//! authentication factor.
//!
//! # Features
//!
//! - **Issuance**: codes drawn from the OS CSPRNG, stored only as Argon2id hashes
//! - **Expiry**: every record carries a TTL enforced by the store
//! - **Single use**: a matching code is consumed atomically
//! - **Throttling**: independent send and validate attempt windows per principal
//!
//! # Example
//!
//! ```no_run
//! use otp_rs::clock::SystemClock;
//! use otp_rs::delivery::ConsoleDelivery;
//! use otp_rs::otp::{OtpService, ValidationOutcome};
//! use otp_rs::store::MemoryStore;
//! use otp_rs::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = OtpService::new(
//!         &Config::default(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(SystemClock),
//!         Arc::new(ConsoleDelivery),
//!     )?;
//!
//!     service.request_code("user-42", "user@example.com").await?;
//!
//!     let outcome = service.verify_code("user-42", "123456").await?;
//!     if outcome == ValidationOutcome::Valid {
//!         println!("Second factor accepted");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`otp`]: Issuer, validator and caller-facing service
//! - [`rate_limit`]: Attempt throttling
//! - [`store`]: Key-value storage backends
//! - [`delivery`]: Delivery channel interface
//! - [`clock`]: Time source

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod otp;
pub mod rate_limit;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{DeliveryError, OtpError, Result};
