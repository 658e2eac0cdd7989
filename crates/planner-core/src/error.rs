//! Error Types

use market_feeds::FetchError;
use thiserror::Error;

use crate::locale::MessageId;

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Planner error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Report could not be assembled
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Recipient or alert persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound message could not be delivered
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Report assembly failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Price data is mandatory; without it the report is meaningless
    #[error("Primary price data unavailable: {0}")]
    PrimaryDataUnavailable(FetchError),
}

/// Rejected free-text input inside an alert dialog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogInputError {
    #[error("Unknown coin: {0}")]
    UnknownCoin(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

/// Failure to hand a message to the transport for one recipient
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Gateway answered but refused the message (blocked bot, bad chat id, ...)
    #[error("Delivery rejected ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// Gateway unreachable or timed out
    #[error("Delivery network error: {0}")]
    Network(String),
}

impl CoreError {
    /// Message shown to the user instead of the error itself
    pub fn user_message(&self) -> MessageId {
        match self {
            CoreError::Aggregation(_) => MessageId::TryLater,
            CoreError::Storage(_) | CoreError::Delivery(_) | CoreError::Config(_) => {
                MessageId::GenericError
            }
        }
    }

    /// Check if the next user command or broadcast cycle may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Aggregation(_) | CoreError::Storage(_) => true,
            CoreError::Delivery(err) => err.is_transient(),
            CoreError::Config(_) => false,
        }
    }
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Network(_) => true,
            DeliveryError::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CoreError::Storage("locked".into()).is_transient());
        assert!(!CoreError::Config("bad".into()).is_transient());

        let blocked = DeliveryError::Rejected { status: 403, description: "blocked".into() };
        let limited = DeliveryError::Rejected { status: 429, description: "slow down".into() };
        assert!(!blocked.is_transient());
        assert!(limited.is_transient());
        assert!(DeliveryError::Network("reset".into()).is_transient());
    }

    #[test]
    fn test_user_message() {
        let err = CoreError::from(AggregationError::PrimaryDataUnavailable(FetchError::Timeout));
        assert_eq!(err.user_message(), MessageId::TryLater);
        assert_eq!(CoreError::Storage("disk full".into()).user_message(), MessageId::GenericError);
        assert_eq!(err.to_string(), "Primary price data unavailable: Upstream timed out");
    }
}
