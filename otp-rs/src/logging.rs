//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{OtpError, Result};

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("otp_rs={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| OtpError::Config(format!("Failed to set tracing subscriber: {}", e)))
}
