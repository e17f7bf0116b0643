//! Console delivery for operators and local development

use async_trait::async_trait;

use super::DeliveryChannel;
use crate::error::DeliveryError;

/// Prints codes to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleDelivery;

#[async_trait]
impl DeliveryChannel for ConsoleDelivery {
    async fn send(&self, destination: &str, code: &str) -> Result<(), DeliveryError> {
        if destination.trim().is_empty() {
            return Err(DeliveryError::InvalidDestination(
                "destination is empty".to_string(),
            ));
        }

        println!("Code for {}: {}", destination, code);
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
