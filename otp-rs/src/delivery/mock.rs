//! Mock delivery channel for testing
//!
//! Records every delivery so tests can read back the plaintext code, and can
//! be switched into a failing mode to exercise delivery errors.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

use super::DeliveryChannel;
use crate::error::DeliveryError;

/// A delivery attempt seen by [`MockDelivery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub code: String,
}

#[derive(Debug, Default)]
pub struct MockDelivery {
    sent: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose sends all fail with [`DeliveryError::Unavailable`]
    pub fn failing() -> Self {
        let mock = Self::default();
        mock.set_failing(true);
        mock
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful deliveries, oldest first
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most recent code delivered to `destination`
    pub fn last_code_for(&self, destination: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|d| d.destination == destination)
            .map(|d| d.code.clone())
    }
}

#[async_trait]
impl DeliveryChannel for MockDelivery {
    async fn send(&self, destination: &str, code: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unavailable("mock channel is down".to_string()));
        }

        debug!("Mock delivery to {}", destination);
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Delivery {
                destination: destination.to_string(),
                code: code.to_string(),
            });
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
