//! Payment error types.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result alias for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur while coordinating payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway could not register the transaction.
    #[error("payment could not be set up: {message}")]
    GatewayRegistrationFailed { message: String },

    /// The gateway refused the operation.
    #[error("payment was declined: {message}")]
    GatewayDeclined { message: String },

    /// The gateway could not be reached, even after a retry.
    #[error("payment provider unreachable: {message}")]
    GatewayTransportError { message: String },

    /// The order already has a registered transaction.
    #[error("a payment is already registered for this order")]
    AlreadyRegistered,

    /// A gateway callback arrived for an order in a state that cannot
    /// accept it (e.g. cancelled in another tab).
    #[error("payment notification did not match the order state")]
    InconsistentCallback,

    /// The gateway does not support the requested operation.
    #[error("payment provider does not support {capability}")]
    UnsupportedCapability { capability: &'static str },

    /// Cancellation preconditions (capability, no preauth, confirmed,
    /// not already cancelled) were not met.
    #[error("this payment cannot be cancelled")]
    NotCancellable,

    /// No gateway is registered under the identifier.
    #[error("unknown payment gateway: {identifier}")]
    UnknownGateway { identifier: i32 },

    /// No gateway has been configured at all.
    #[error("no payment gateway configured")]
    NoGateway,

    /// Order-level failure.
    #[error(transparent)]
    Order(#[from] orders::OrderError),

    /// Catalog-level failure (stock adjustment).
    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),

    /// Serialisation failure.
    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(message) => PaymentError::GatewayTransportError { message },
            GatewayError::Declined(message) => PaymentError::GatewayDeclined { message },
            GatewayError::Unsupported(capability) => {
                PaymentError::UnsupportedCapability { capability }
            }
        }
    }
}
