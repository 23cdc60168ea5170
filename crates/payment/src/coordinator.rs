//! Orchestrates payment flows against the order store and gateways.

use std::future::Future;
use std::sync::Arc;

use catalog::CatalogStore;
use chrono::{Duration, Utc};
use common::ShopConfig;
use orders::{ApprovalStatus, Order, OrderError, OrderId, OrderStatus, OrderStore};

use crate::error::{PaymentError, Result};
use crate::gateway::{Gateway, GatewayError, GatewayRegistry, Registration};
use crate::stock::StockAdjuster;

/// The parsed verdict of a gateway's asynchronous callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Funds captured, or reserved when the gateway uses preauth.
    Authorised,
    /// The gateway rejected the payment.
    Declined,
    /// The gateway reported a processing failure.
    Error,
}

/// Calls the gateway, retrying once on a transport error.
///
/// Gateways key transactions by order reference, so the repeat of an
/// interrupted call is idempotent on their side.
async fn retry_once<T, F, Fut>(order_ref: &str, operation: &'static str, call: F) -> std::result::Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, GatewayError>>,
{
    match call().await {
        Err(GatewayError::Transport(first)) => {
            tracing::warn!(order_ref, operation, error = %first, "gateway transport error, retrying");
            call().await
        }
        other => other,
    }
}

/// Coordinates order payment against a registry of gateways.
///
/// Every operation reloads the order, validates its current state, calls
/// the gateway, and persists the outcome through the store's versioned
/// update, so concurrent attempts on one order serialise.
pub struct PaymentCoordinator<S, C> {
    store: Arc<S>,
    registry: GatewayRegistry,
    stock: StockAdjuster<C>,
    config: ShopConfig,
}

impl<S: OrderStore, C: CatalogStore> PaymentCoordinator<S, C> {
    /// Creates a new coordinator.
    pub fn new(
        store: Arc<S>,
        catalog: Arc<C>,
        registry: GatewayRegistry,
        config: ShopConfig,
    ) -> Self {
        Self {
            store,
            registry,
            stock: StockAdjuster::new(catalog),
            config,
        }
    }

    /// Returns the gateway registry.
    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| PaymentError::Order(OrderError::NotFound {
                id: order_id.to_string(),
            }))
    }

    fn gateway_for(&self, order: &Order) -> Result<Arc<dyn Gateway>> {
        let identifier = order.gateway.ok_or(PaymentError::NoGateway)?;
        self.registry
            .get(identifier)
            .ok_or(PaymentError::UnknownGateway { identifier })
    }

    /// Registers a pending transaction with the order's gateway and
    /// moves the order to `payment_awaiting`.
    ///
    /// A second call on an already-registered order fails with
    /// [`PaymentError::AlreadyRegistered`] and leaves the stored payment
    /// details untouched.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn register(&self, order_id: OrderId) -> Result<(Order, Registration)> {
        let mut order = self.load(order_id).await?;
        if order.status == OrderStatus::PaymentAwaiting {
            return Err(PaymentError::AlreadyRegistered);
        }

        let gateway = match order.gateway {
            Some(identifier) => self
                .registry
                .get(identifier)
                .ok_or(PaymentError::UnknownGateway { identifier })?,
            None => self.registry.default_gateway().ok_or(PaymentError::NoGateway)?,
        };
        order.gateway = Some(gateway.identifier());
        order.transition_to(OrderStatus::PaymentAwaiting)?;

        let attempt =
            retry_once(&order.order_ref, "register", || gateway.register(&order)).await;
        let registration = match attempt {
            Ok(registration) => registration,
            Err(GatewayError::Transport(message)) => {
                order.fail_payment(message.clone())?;
                self.store.update(order).await?;
                metrics::counter!("shop_payment_errors_total").increment(1);
                return Err(PaymentError::GatewayTransportError { message });
            }
            Err(GatewayError::Declined(message)) => {
                order.decline_payment(serde_json::json!({ "error": message }))?;
                self.store.update(order).await?;
                return Err(PaymentError::GatewayRegistrationFailed { message });
            }
            Err(GatewayError::Unsupported(capability)) => {
                return Err(PaymentError::UnsupportedCapability { capability });
            }
        };

        order.record_payment_details(registration.pending_details.clone());
        let order = self.store.update(order).await.map_err(|err| match err {
            OrderError::Conflict { .. } => PaymentError::AlreadyRegistered,
            other => PaymentError::Order(other),
        })?;

        metrics::counter!("shop_payments_registered_total").increment(1);
        Ok((order, registration))
    }

    /// Applies a gateway's asynchronous outcome to the order.
    ///
    /// The order is reloaded and its state revalidated: the customer may
    /// have cancelled in another tab, in which case a success callback is
    /// ignored and recorded as inconsistent.
    #[tracing::instrument(skip(self, payload), fields(order = %order_id, ?outcome))]
    pub async fn confirm(
        &self,
        order_id: OrderId,
        outcome: CallbackOutcome,
        payload: serde_json::Value,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.cancelled || order.status != OrderStatus::PaymentAwaiting {
            tracing::warn!(
                order_ref = %order.order_ref,
                status = %order.status,
                cancelled = order.cancelled,
                "gateway callback does not match order state"
            );
            metrics::counter!("shop_inconsistent_callbacks_total").increment(1);
            return Err(PaymentError::InconsistentCallback);
        }

        match outcome {
            CallbackOutcome::Authorised => {
                let gateway = self.gateway_for(&order)?;
                let preauth = self.config.preauth && gateway.uses_preauth();
                order.confirm_payment(preauth, payload)?;
                self.stock.apply(&order).await?;
                let order = self.store.update(order).await?;
                metrics::counter!("shop_payments_confirmed_total").increment(1);
                Ok(order)
            }
            CallbackOutcome::Declined => {
                order.decline_payment(payload)?;
                let order = self.store.update(order).await?;
                metrics::counter!("shop_payments_declined_total").increment(1);
                Ok(order)
            }
            CallbackOutcome::Error => {
                order.record_payment_details(payload);
                order.fail_payment("gateway reported a processing failure")?;
                let order = self.store.update(order).await?;
                metrics::counter!("shop_payment_errors_total").increment(1);
                Ok(order)
            }
        }
    }

    /// Places an invoice-route order without online payment.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn place_invoice(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.transition_to(OrderStatus::PlacedInvoice)?;
        self.stock.apply(&order).await?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_orders_placed_total").increment(1);
        Ok(order)
    }

    /// Places a zero-amount order, bypassing payment.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn place_zero_amount(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.transition_to(OrderStatus::PlacedZeroAmount)?;
        self.stock.apply(&order).await?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_orders_placed_total").increment(1);
        Ok(order)
    }

    /// Settles a waiting preauth and approves the order.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn approve(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.approval_status != ApprovalStatus::Waiting {
            return Err(PaymentError::Order(OrderError::ApprovalNotWaiting {
                actual: order.approval_status,
            }));
        }
        let gateway = self.gateway_for(&order)?;
        let ack =
            retry_once(&order.order_ref, "settle", || gateway.settle(&order, order.total)).await?;
        if !ack.ok {
            return Err(PaymentError::GatewayDeclined {
                message: ack.message,
            });
        }

        order.approve()?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_approvals_total", "verdict" => "approved").increment(1);
        tracing::info!(order_ref = %order.order_ref, "order approved, customer notified");
        Ok(order)
    }

    /// Aborts a waiting preauth and rejects the order.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn reject(&self, order_id: OrderId, reason: &str) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.approval_status != ApprovalStatus::Waiting {
            return Err(PaymentError::Order(OrderError::ApprovalNotWaiting {
                actual: order.approval_status,
            }));
        }
        let gateway = self.gateway_for(&order)?;
        let ack = retry_once(&order.order_ref, "abort", || gateway.abort(&order)).await?;
        if !ack.ok {
            return Err(PaymentError::GatewayDeclined {
                message: ack.message,
            });
        }

        order.reject(reason)?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_approvals_total", "verdict" => "rejected").increment(1);
        tracing::info!(order_ref = %order.order_ref, "order rejected, customer notified");
        Ok(order)
    }

    /// Cancels a captured payment.
    ///
    /// Requires a gateway with the cancel capability, a non-preauth
    /// payment that has been confirmed, and an order not already
    /// cancelled.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn cancel(&self, order_id: OrderId, reason: &str) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let gateway = self.gateway_for(&order)?;
        if !gateway.has_cancel() {
            return Err(PaymentError::UnsupportedCapability { capability: "cancel" });
        }
        if order.preauth || order.cancelled || order.payment_confirmed_at.is_none() {
            return Err(PaymentError::NotCancellable);
        }

        let ack = retry_once(&order.order_ref, "cancel", || gateway.cancel(&order)).await?;
        if !ack.ok {
            return Err(PaymentError::GatewayDeclined {
                message: ack.message,
            });
        }

        order.cancel_payment(reason)?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_payments_cancelled_total").increment(1);
        Ok(order)
    }

    /// Notifies the gateway of fulfilment and marks the order fulfilled.
    /// Irreversible.
    #[tracing::instrument(skip(self), fields(order = %order_id))]
    pub async fn fulfil(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let gateway = self.gateway_for(&order)?;
        if !gateway.has_fulfilment() {
            return Err(PaymentError::UnsupportedCapability {
                capability: "fulfilment",
            });
        }
        if order.fulfilled {
            return Err(PaymentError::Order(OrderError::AlreadyFulfilled));
        }

        let ack = retry_once(&order.order_ref, "fulfilment", || gateway.fulfilment(&order)).await?;
        if !ack.ok {
            return Err(PaymentError::GatewayDeclined {
                message: ack.message,
            });
        }

        order.mark_fulfilled()?;
        let order = self.store.update(order).await?;
        metrics::counter!("shop_fulfilments_total").increment(1);
        Ok(order)
    }

    /// Times out approvals that have waited longer than the configured
    /// TTL, aborting each reservation with the gateway.
    ///
    /// Runs from the background sweeper; failures are logged and skipped,
    /// never raised to a request.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_approval_timeouts(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(self.config.approval_ttl_hours);
        let stale = self.store.approvals_waiting_before(cutoff).await?;
        let mut swept = 0;

        for mut order in stale {
            let gateway = match self.gateway_for(&order) {
                Ok(gateway) => gateway,
                Err(err) => {
                    tracing::warn!(order_ref = %order.order_ref, error = %err, "cannot abort stale approval");
                    continue;
                }
            };
            if let Err(err) =
                retry_once(&order.order_ref, "abort", || gateway.abort(&order)).await
            {
                tracing::warn!(order_ref = %order.order_ref, error = %err, "gateway abort failed during sweep");
                continue;
            }
            if order.timeout_approval().is_err() {
                continue;
            }
            match self.store.update(order).await {
                Ok(order) => {
                    swept += 1;
                    metrics::counter!("shop_approvals_total", "verdict" => "timeout").increment(1);
                    tracing::info!(order_ref = %order.order_ref, "approval timed out");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "could not persist approval timeout");
                }
            }
        }

        Ok(swept)
    }
}
