//! The gateway capability contract and test implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use orders::Order;
use thiserror::Error;

/// A gateway-level failure.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway could not be reached; retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway understood and refused.
    #[error("declined: {0}")]
    Declined(String),

    /// The gateway does not implement this capability.
    #[error("unsupported capability: {0}")]
    Unsupported(&'static str),
}

/// Result of registering a transaction.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Gateway-specific pending-transaction details, persisted on the
    /// order.
    pub pending_details: serde_json::Value,
    /// Where to send the customer (redirect URL or hosted form).
    pub redirect: String,
}

/// A simple ok/message acknowledgement from the gateway.
#[derive(Debug, Clone)]
pub struct Ack {
    pub ok: bool,
    pub message: String,
}

impl Ack {
    /// A positive acknowledgement.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// A negative acknowledgement.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// The capability contract a payment provider implements.
///
/// Not every gateway supports every capability; callers query the
/// `has_*`/`can_*` methods before invoking the corresponding operation.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Stable identifier for this gateway; keys the registry and is
    /// persisted on orders.
    fn identifier(&self) -> i32;

    /// Supports merchant-keyed (mail order / telephone order) payments.
    fn can_moto(&self) -> bool {
        false
    }

    /// Supports cancelling a captured payment.
    fn has_cancel(&self) -> bool {
        false
    }

    /// Supports a fulfilment notification.
    fn has_fulfilment(&self) -> bool {
        false
    }

    /// Registers transactions as deferred capture (preauth).
    fn uses_preauth(&self) -> bool {
        false
    }

    /// Registers a pending transaction for the order.
    async fn register(&self, order: &Order) -> Result<Registration, GatewayError>;

    /// Captures previously reserved funds.
    async fn settle(&self, order: &Order, amount: Money) -> Result<Ack, GatewayError>;

    /// Releases previously reserved funds.
    async fn abort(&self, order: &Order) -> Result<Ack, GatewayError>;

    /// Cancels a captured payment.
    async fn cancel(&self, order: &Order) -> Result<Ack, GatewayError>;

    /// Notifies the gateway the order has been fulfilled.
    async fn fulfilment(&self, order: &Order) -> Result<Ack, GatewayError>;
}

/// Maps gateway identifiers to implementations.
///
/// Which gateway serves a new order is a policy decision; the default
/// here is the first registered gateway unless one is set explicitly.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<i32, Arc<dyn Gateway>>,
    default: Option<i32>,
}

impl GatewayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway; the first registration becomes the default.
    pub fn register(&mut self, gateway: Arc<dyn Gateway>) {
        let id = gateway.identifier();
        if self.default.is_none() {
            self.default = Some(id);
        }
        self.gateways.insert(id, gateway);
    }

    /// Overrides the default gateway.
    pub fn set_default(&mut self, identifier: i32) {
        self.default = Some(identifier);
    }

    /// Looks up a gateway by identifier.
    pub fn get(&self, identifier: i32) -> Option<Arc<dyn Gateway>> {
        self.gateways.get(&identifier).cloned()
    }

    /// The gateway a new order should register with.
    pub fn default_gateway(&self) -> Option<Arc<dyn Gateway>> {
        self.default.and_then(|id| self.get(id))
    }
}

#[derive(Debug, Default)]
struct TestGatewayState {
    /// Remaining register calls that fail with a transport error.
    transport_failures: u32,
    decline_register: bool,
    register_calls: u32,
    settle_calls: u32,
    abort_calls: u32,
    cancel_calls: u32,
    fulfilment_calls: u32,
    next_txn: u32,
}

/// Configurable in-memory gateway for tests.
#[derive(Clone)]
pub struct TestGateway {
    identifier: i32,
    preauth: bool,
    cancel: bool,
    fulfilment: bool,
    moto: bool,
    state: Arc<RwLock<TestGatewayState>>,
}

impl TestGateway {
    /// A gateway with immediate capture and no optional capabilities.
    pub fn new(identifier: i32) -> Self {
        Self {
            identifier,
            preauth: false,
            cancel: false,
            fulfilment: false,
            moto: false,
            state: Arc::new(RwLock::new(TestGatewayState::default())),
        }
    }

    /// Enables deferred capture.
    pub fn with_preauth(mut self) -> Self {
        self.preauth = true;
        self
    }

    /// Enables the cancel capability.
    pub fn with_cancel(mut self) -> Self {
        self.cancel = true;
        self
    }

    /// Enables the fulfilment capability.
    pub fn with_fulfilment(mut self) -> Self {
        self.fulfilment = true;
        self
    }

    /// Enables merchant-keyed payments.
    pub fn with_moto(mut self) -> Self {
        self.moto = true;
        self
    }

    /// Makes the next `count` register calls fail with a transport
    /// error.
    pub fn fail_transport(&self, count: u32) {
        self.state.write().unwrap().transport_failures = count;
    }

    /// Makes register calls decline.
    pub fn set_decline(&self, decline: bool) {
        self.state.write().unwrap().decline_register = decline;
    }

    /// Number of register calls seen.
    pub fn register_calls(&self) -> u32 {
        self.state.read().unwrap().register_calls
    }

    /// Number of settle calls seen.
    pub fn settle_calls(&self) -> u32 {
        self.state.read().unwrap().settle_calls
    }

    /// Number of abort calls seen.
    pub fn abort_calls(&self) -> u32 {
        self.state.read().unwrap().abort_calls
    }

    /// Number of cancel calls seen.
    pub fn cancel_calls(&self) -> u32 {
        self.state.read().unwrap().cancel_calls
    }

    /// Number of fulfilment calls seen.
    pub fn fulfilment_calls(&self) -> u32 {
        self.state.read().unwrap().fulfilment_calls
    }
}

#[async_trait]
impl Gateway for TestGateway {
    fn identifier(&self) -> i32 {
        self.identifier
    }

    fn can_moto(&self) -> bool {
        self.moto
    }

    fn has_cancel(&self) -> bool {
        self.cancel
    }

    fn has_fulfilment(&self) -> bool {
        self.fulfilment
    }

    fn uses_preauth(&self) -> bool {
        self.preauth
    }

    async fn register(&self, order: &Order) -> Result<Registration, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.register_calls += 1;
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        if state.decline_register {
            return Err(GatewayError::Declined("card refused".to_string()));
        }
        state.next_txn += 1;
        let txn = format!("TXN-{:04}", state.next_txn);
        Ok(Registration {
            pending_details: serde_json::json!({
                "txn": txn,
                "order_ref": order.order_ref,
                "preauth": self.preauth,
            }),
            redirect: format!("https://gateway.test/pay/{txn}"),
        })
    }

    async fn settle(&self, _order: &Order, amount: Money) -> Result<Ack, GatewayError> {
        self.state.write().unwrap().settle_calls += 1;
        Ok(Ack::ok(format!("settled {amount}")))
    }

    async fn abort(&self, _order: &Order) -> Result<Ack, GatewayError> {
        self.state.write().unwrap().abort_calls += 1;
        Ok(Ack::ok("aborted"))
    }

    async fn cancel(&self, _order: &Order) -> Result<Ack, GatewayError> {
        if !self.cancel {
            return Err(GatewayError::Unsupported("cancel"));
        }
        self.state.write().unwrap().cancel_calls += 1;
        Ok(Ack::ok("cancelled"))
    }

    async fn fulfilment(&self, _order: &Order) -> Result<Ack, GatewayError> {
        if !self.fulfilment {
            return Err(GatewayError::Unsupported("fulfilment"));
        }
        self.state.write().unwrap().fulfilment_calls += 1;
        Ok(Ack::ok("fulfilment recorded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orders::Order;

    fn order() -> Order {
        Order::create_empty_customer_not_present("T1".to_string())
    }

    #[tokio::test]
    async fn test_register_produces_pending_details() {
        let gateway = TestGateway::new(1);
        let registration = gateway.register(&order()).await.unwrap();
        assert_eq!(registration.pending_details["txn"], "TXN-0001");
        assert!(registration.redirect.starts_with("https://gateway.test/"));
    }

    #[tokio::test]
    async fn test_transport_failures_then_success() {
        let gateway = TestGateway::new(1);
        gateway.fail_transport(1);

        assert!(matches!(
            gateway.register(&order()).await,
            Err(GatewayError::Transport(_))
        ));
        assert!(gateway.register(&order()).await.is_ok());
        assert_eq!(gateway.register_calls(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_capabilities_error() {
        let gateway = TestGateway::new(1);
        assert!(!gateway.has_cancel());
        assert!(matches!(
            gateway.cancel(&order()).await,
            Err(GatewayError::Unsupported("cancel"))
        ));
    }

    #[test]
    fn test_registry_default_is_first_registered() {
        let mut registry = GatewayRegistry::new();
        registry.register(Arc::new(TestGateway::new(7)));
        registry.register(Arc::new(TestGateway::new(9)));

        assert_eq!(registry.default_gateway().unwrap().identifier(), 7);
        registry.set_default(9);
        assert_eq!(registry.default_gateway().unwrap().identifier(), 9);
        assert!(registry.get(8).is_none());
    }
}
