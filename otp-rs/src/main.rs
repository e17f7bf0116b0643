//! Operator CLI for the OTP engine
//!
//! Codes are kept in the SQLite store from the configuration and "delivered"
//! to standard output.
//!
//! # Usage
//!
//! ```bash
//! # Issue a code
//! otp-rs request user-42 user@example.com
//!
//! # Check a code
//! otp-rs verify user-42 482913
//!
//! # Withdraw an outstanding code
//! otp-rs revoke user-42
//!
//! # Remove expired records and counters
//! otp-rs --config otp.toml purge
//! ```
//!
//! Exits with 1 when a code is rejected or a request is throttled, and with 2
//! when a code was issued but could not be delivered.

use clap::{Parser, Subcommand};
use otp_rs::clock::{Clock, SystemClock};
use otp_rs::delivery::ConsoleDelivery;
use otp_rs::otp::{DeliveryStatus, OtpService, RequestOutcome, ValidationOutcome};
use otp_rs::store::SqliteStore;
use otp_rs::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "otp-rs")]
#[command(about = "Issue and validate one-time passcodes", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used when absent)
    #[arg(short, long, default_value = "otp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a code and print it
    Request {
        /// Principal identifier
        principal: String,
        /// Where the code should be sent
        destination: String,
    },
    /// Validate a code
    Verify {
        /// Principal identifier
        principal: String,
        /// Submitted code
        code: String,
    },
    /// Withdraw the outstanding code
    Revoke {
        /// Principal identifier
        principal: String,
    },
    /// Delete expired records and counters
    Purge,
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Rejected,
    DeliveryFailed,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => ExitCode::SUCCESS,
            Status::Rejected => ExitCode::from(1),
            Status::DeliveryFailed => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    otp_rs::logging::init(&config.logging)?;
    info!("Starting otp-rs v{}", env!("CARGO_PKG_VERSION"));

    let status = run(cli.command, &config, Arc::new(SystemClock)).await?;
    Ok(status.into())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Ok(Config::from_file(path)?)
    } else {
        Ok(Config::default())
    }
}

/// Open the store, run `command` and close the pool whatever the outcome
async fn run(
    command: Commands,
    config: &Config,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Status> {
    let store = Arc::new(SqliteStore::connect(&config.store, Arc::clone(&clock)).await?);

    let result = execute(command, config, Arc::clone(&store), clock).await;
    store.close().await;

    result
}

async fn execute(
    command: Commands,
    config: &Config,
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Status> {
    match command {
        Commands::Request {
            principal,
            destination,
        } => {
            let service = OtpService::new(config, store, clock, Arc::new(ConsoleDelivery))?;

            match service.request_code(&principal, &destination).await? {
                RequestOutcome::Issued {
                    expires_at,
                    delivery: DeliveryStatus::Delivered,
                } => {
                    println!("✓ Code issued for {} (expires at {})", principal, expires_at);
                    Ok(Status::Success)
                }
                RequestOutcome::Issued {
                    delivery: DeliveryStatus::Failed(e),
                    ..
                } => {
                    eprintln!("Code issued for {} but delivery failed: {}", principal, e);
                    Ok(Status::DeliveryFailed)
                }
                RequestOutcome::RateLimited => {
                    eprintln!("Too many code requests for {}, try again later", principal);
                    Ok(Status::Rejected)
                }
            }
        }
        Commands::Verify { principal, code } => {
            let service = OtpService::new(config, store, clock, Arc::new(ConsoleDelivery))?;

            match service.verify_code(&principal, &code).await? {
                ValidationOutcome::Valid => {
                    println!("✓ Code accepted for {}", principal);
                    Ok(Status::Success)
                }
                other => {
                    println!("✗ Code rejected for {}: {}", principal, other);
                    Ok(Status::Rejected)
                }
            }
        }
        Commands::Revoke { principal } => {
            let service = OtpService::new(config, store, clock, Arc::new(ConsoleDelivery))?;

            if service.revoke(&principal).await? {
                println!("✓ Outstanding code for {} revoked", principal);
            } else {
                println!("No outstanding code for {}", principal);
            }
            Ok(Status::Success)
        }
        Commands::Purge => {
            let removed = store.purge_expired().await?;
            println!("✓ Removed {} expired entries", removed);
            Ok(Status::Success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otp_rs::config::HashConfig;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.hashing = HashConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        };
        config.store.database_url =
            format!("sqlite://{}?mode=rwc", dir.path().join("otp.db").display());
        config
    }

    fn command(args: &[&str]) -> Commands {
        let mut argv = vec!["otp-rs"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[tokio::test]
    async fn test_commands_report_status_instead_of_exiting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let status = run(command(&["verify", "42", "123456"]), &config, clock.clone())
            .await
            .unwrap();
        assert_eq!(status, Status::Rejected);

        for _ in 0..config.rate_limit.send.max_attempts {
            let status = run(
                command(&["request", "42", "user@example.com"]),
                &config,
                clock.clone(),
            )
            .await
            .unwrap();
            assert_eq!(status, Status::Success);
        }

        let status = run(
            command(&["request", "42", "user@example.com"]),
            &config,
            clock.clone(),
        )
        .await
        .unwrap();
        assert_eq!(status, Status::Rejected);

        let status = run(command(&["request", "43", " "]), &config, clock.clone())
            .await
            .unwrap();
        assert_eq!(status, Status::DeliveryFailed);

        let status = run(command(&["revoke", "42"]), &config, clock.clone())
            .await
            .unwrap();
        assert_eq!(status, Status::Success);

        let status = run(command(&["purge"]), &config, clock).await.unwrap();
        assert_eq!(status, Status::Success);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/otp.toml")).unwrap();
        assert_eq!(config.otp.code_length, 6);
    }
}
