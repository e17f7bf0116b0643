use thiserror::Error;

#[derive(Error, Debug)]
pub enum OtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for OtpError {
    fn from(err: sqlx::Error) -> Self {
        OtpError::Storage(err.to_string())
    }
}

/// Errors raised by a delivery channel
///
/// Delivery failures never invalidate an issued code; they are reported
/// back to the caller next to the issuance result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, OtpError>;
