//! Payment coordination for the shop core.
//!
//! [`Gateway`] is the capability contract a payment provider implements;
//! the [`GatewayRegistry`] maps gateway identifiers to implementations.
//! [`PaymentCoordinator`] drives registration, the asynchronous gateway
//! callback, the preauth approve/reject cycle, cancellation and
//! fulfilment, persisting every outcome through the order store. The
//! [`StockAdjuster`] decrements stock when an order is confirmed, and the
//! sweeper times out stale approvals in the background.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod stock;
pub mod sweeper;

pub use coordinator::{CallbackOutcome, PaymentCoordinator};
pub use error::PaymentError;
pub use gateway::{Ack, Gateway, GatewayError, GatewayRegistry, Registration, TestGateway};
pub use stock::{OversellAttempt, StockAdjuster};
pub use sweeper::run_sweeper;
