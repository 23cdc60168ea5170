//! Order error types.

use thiserror::Error;

use crate::status::{ApprovalStatus, OrderStatus};

/// Result alias for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The transition is not in the state machine's table.
    #[error("cannot move order from {from} to {to}")]
    IllegalStateTransition { from: OrderStatus, to: OrderStatus },

    /// Approve/reject requires a waiting approval.
    #[error("order approval is {actual}, not waiting")]
    ApprovalNotWaiting { actual: ApprovalStatus },

    /// Fulfilment is irreversible and already happened.
    #[error("order is already fulfilled")]
    AlreadyFulfilled,

    /// Only `new_order` orders may be edited.
    #[error("order in {status} can no longer be edited")]
    NotEditable { status: OrderStatus },

    /// The tracking provider is not configured.
    #[error("unknown tracking provider: {name}")]
    UnknownTrackingProvider { name: String },

    /// The order does not exist.
    #[error("order not found: {id}")]
    NotFound { id: String },

    /// Another writer committed first.
    #[error("order was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },

    /// The public reference or secret id is already taken.
    #[error("duplicate order identifier: {value}")]
    DuplicateIdentifier { value: String },

    /// Serialisation failure.
    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}
