//! One-time passcode lifecycle
//!
//! - [`issuer`]: code generation and storage
//! - [`validator`]: single-use, throttled validation
//! - [`service`]: caller-facing request/verify operations

pub mod code;
pub mod issuer;
pub mod locks;
pub mod service;
pub mod types;
pub mod validator;

pub use code::{generate_code, CodeHasher};
pub use issuer::CodeIssuer;
pub use locks::PrincipalLocks;
pub use service::OtpService;
pub use types::*;
pub use validator::CodeValidator;
