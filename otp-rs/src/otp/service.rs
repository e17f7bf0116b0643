//! Caller-facing OTP operations
//!
//! Wires the issuer, validator, send throttle and delivery channel around a
//! shared store, clock and lock table. Transport layers call
//! [`OtpService::request_code`] and [`OtpService::verify_code`].

use std::sync::Arc;
use tracing::{info, warn};

use super::issuer::CodeIssuer;
use super::locks::PrincipalLocks;
use super::types::{DeliveryStatus, RequestOutcome, ValidationOutcome};
use super::validator::CodeValidator;
use crate::clock::Clock;
use crate::config::{Config, RateLimitPolicy};
use crate::delivery::DeliveryChannel;
use crate::error::Result;
use crate::rate_limit::{RateLimiter, ThrottleAction};
use crate::store::Store;

pub struct OtpService {
    issuer: CodeIssuer,
    validator: CodeValidator,
    limiter: RateLimiter,
    delivery: Arc<dyn DeliveryChannel>,
    send_policy: RateLimitPolicy,
}

impl OtpService {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Result<Self> {
        config.validate()?;

        let locks = Arc::new(PrincipalLocks::new());

        Ok(Self {
            issuer: CodeIssuer::new(
                config,
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&locks),
            )?,
            validator: CodeValidator::new(config, Arc::clone(&store), clock, locks)?,
            limiter: RateLimiter::new(store),
            delivery,
            send_policy: config.rate_limit.send,
        })
    }

    /// Issue a code for `principal_id` and hand it to the delivery channel
    ///
    /// A failed delivery still leaves the new code outstanding; the failure
    /// is returned in [`DeliveryStatus::Failed`].
    pub async fn request_code(
        &self,
        principal_id: &str,
        destination: &str,
    ) -> Result<RequestOutcome> {
        let throttle_key = ThrottleAction::Send.key(principal_id);

        let allowed = self
            .limiter
            .check_and_hit(
                &throttle_key,
                self.send_policy.max_attempts,
                self.send_policy.window(),
            )
            .await?;

        if !allowed {
            return Ok(RequestOutcome::RateLimited);
        }

        let issued = self.issuer.issue(principal_id).await?;

        let delivery = match self.delivery.send(destination, issued.code()).await {
            Ok(()) => {
                info!(
                    "Code for {} delivered via {}",
                    principal_id,
                    self.delivery.name()
                );
                DeliveryStatus::Delivered
            }
            Err(e) => {
                warn!(
                    "Failed to deliver code for {} via {}: {}",
                    principal_id,
                    self.delivery.name(),
                    e
                );
                DeliveryStatus::Failed(e)
            }
        };

        Ok(RequestOutcome::Issued {
            expires_at: issued.expires_at,
            delivery,
        })
    }

    /// Check a submitted code; see [`CodeValidator::validate`]
    pub async fn verify_code(&self, principal_id: &str, code: &str) -> Result<ValidationOutcome> {
        self.validator.validate(principal_id, code).await
    }

    /// Withdraw the outstanding code for `principal_id`
    pub async fn revoke(&self, principal_id: &str) -> Result<bool> {
        self.issuer.revoke(principal_id).await
    }

    pub fn issuer(&self) -> &CodeIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &CodeValidator {
        &self.validator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::HashConfig;
    use crate::delivery::MockDelivery;
    use crate::error::{DeliveryError, OtpError};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.hashing = HashConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    fn service(delivery: Arc<MockDelivery>) -> (OtpService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let service = OtpService::new(&test_config(), store, clock.clone(), delivery).unwrap();
        (service, clock)
    }

    #[tokio::test]
    async fn test_request_then_verify() {
        let delivery = Arc::new(MockDelivery::new());
        let (service, clock) = service(delivery.clone());

        let outcome = service.request_code("alice", "alice@example.com").await.unwrap();
        assert_eq!(
            outcome,
            RequestOutcome::Issued {
                expires_at: clock.now() + chrono::Duration::minutes(10),
                delivery: DeliveryStatus::Delivered,
            }
        );

        let code = delivery.last_code_for("alice@example.com").unwrap();
        assert_eq!(
            service.verify_code("alice", &code).await.unwrap(),
            ValidationOutcome::Valid
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_code_valid() {
        let delivery = Arc::new(MockDelivery::failing());
        let (service, _clock) = service(delivery);

        let outcome = service.request_code("alice", "alice@example.com").await.unwrap();
        let RequestOutcome::Issued { delivery, .. } = outcome else {
            panic!("expected an issued code, got {:?}", outcome);
        };
        assert!(matches!(
            delivery,
            DeliveryStatus::Failed(DeliveryError::Unavailable(_))
        ));

        // The code exists even though nobody received it
        assert!(service.revoke("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_send_throttle() {
        let delivery = Arc::new(MockDelivery::new());
        let (service, clock) = service(delivery.clone());

        for _ in 0..5 {
            let outcome = service.request_code("alice", "alice@example.com").await.unwrap();
            assert!(matches!(outcome, RequestOutcome::Issued { .. }));
        }

        let outcome = service.request_code("alice", "alice@example.com").await.unwrap();
        assert_eq!(outcome, RequestOutcome::RateLimited);
        assert_eq!(delivery.deliveries().len(), 5);

        // Other principals and validation are unaffected
        let outcome = service.request_code("bob", "bob@example.com").await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Issued { .. }));
        let code = delivery.last_code_for("alice@example.com").unwrap();
        assert_eq!(
            service.verify_code("alice", &code).await.unwrap(),
            ValidationOutcome::Valid
        );

        clock.advance(Duration::from_secs(60));
        let outcome = service.request_code("alice", "alice@example.com").await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Issued { .. }));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let mut config = test_config();
        config.otp.code_length = 1;

        let result = OtpService::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::default()),
            Arc::new(MockDelivery::new()),
        );
        assert!(matches!(result, Err(OtpError::Config(_))));
    }
}
