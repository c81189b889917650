use thiserror::Error;

/// Errors the Broker Adapter can surface to its callers (§7: transient I/O
/// is retried internally and never reaches here except as a log).
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("failed to build mqtt options: {0}")]
    Options(String),

    #[error("payload is not valid utf-8: {0}")]
    InvalidPayload(#[from] std::str::Utf8Error),

    #[error("adapter is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, BrokerError>;
