//! Delivery channel abstraction
//!
//! The engine never sends codes itself. A [`DeliveryChannel`] receives the
//! plaintext right after issuance; its failure is reported to the caller but
//! does not undo the issuance.

use async_trait::async_trait;

use crate::error::DeliveryError;

pub mod console;
pub mod mock;

pub use console::ConsoleDelivery;
pub use mock::MockDelivery;

/// Channel that carries a code to its destination (email, SMS, push...)
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver `code` to `destination`
    async fn send(&self, destination: &str, code: &str) -> Result<(), DeliveryError>;

    /// Channel name, used in logs
    fn name(&self) -> &str;
}
