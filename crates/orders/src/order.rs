//! The order aggregate.

use basket::{Address, Basket};
use catalog::{DeliveryOptionId, FinanceOptionId};
use chrono::{DateTime, Utc};
use common::{Money, ShopConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};
use crate::ids::{CustomerId, OrderId, generate_secret_id};
use crate::status::{ApprovalStatus, OrderStatus};

/// Where a finance (loan) application stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    NotRequested,
    Pending,
    Accepted,
    Declined,
}

/// An order: the snapshot of a basket at checkout.
///
/// The basket is serialised verbatim into `basket_json` so the order
/// stays self-describing when the catalog changes. Totals, addresses and
/// the voucher are denormalised for the same reason. After payment is
/// confirmed the snapshot never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Public order reference, per the configured format.
    pub order_ref: String,
    /// Unguessable token for the customer-visible status URL.
    pub secret_id: String,
    pub status: OrderStatus,
    pub approval_status: ApprovalStatus,
    pub loan_status: LoanStatus,
    /// None for guest checkouts.
    pub customer: Option<CustomerId>,
    pub full_name: String,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub billing: Option<Address>,
    pub delivery: Option<Address>,
    pub click_and_collect: bool,
    /// Serialised basket (layout v2).
    pub basket_json: serde_json::Value,
    pub sub_total: Money,
    pub sub_total_before_delivery: Money,
    pub delivery_charge: Money,
    pub total: Money,
    pub is_quote_only: bool,
    pub voucher_code: Option<String>,
    pub voucher_title: Option<String>,
    pub voucher_discount: Money,
    pub delivery_option_id: Option<DeliveryOptionId>,
    pub delivery_option_title: Option<String>,
    pub finance_option_id: Option<FinanceOptionId>,
    pub loan_deposit: Option<Decimal>,
    pub survey: Option<String>,
    pub special_requirements: Option<String>,
    pub invoice: bool,
    /// Identifier of the gateway handling payment, once registered.
    pub gateway: Option<i32>,
    /// Gateway-specific transaction details.
    pub payment_details: Option<serde_json::Value>,
    pub preauth: bool,
    pub settled: bool,
    pub aborted: bool,
    pub fulfilled: bool,
    pub cancelled: bool,
    pub approval_reason: Option<String>,
    pub cancel_reason: Option<String>,
    pub tracking_provider: Option<String>,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub approval_requested_at: Option<DateTime<Utc>>,
    /// Concurrency counter; the store rejects stale writes.
    pub version: u64,
}

impl Order {
    fn base(order_ref: String, status: OrderStatus) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            order_ref,
            secret_id: generate_secret_id(),
            status,
            approval_status: ApprovalStatus::None,
            loan_status: LoanStatus::NotRequested,
            customer: None,
            full_name: String::new(),
            email: None,
            telephone: None,
            billing: None,
            delivery: None,
            click_and_collect: false,
            basket_json: serde_json::Value::Null,
            sub_total: Money::zero(),
            sub_total_before_delivery: Money::zero(),
            delivery_charge: Money::zero(),
            total: Money::zero(),
            is_quote_only: false,
            voucher_code: None,
            voucher_title: None,
            voucher_discount: Money::zero(),
            delivery_option_id: None,
            delivery_option_title: None,
            finance_option_id: None,
            loan_deposit: None,
            survey: None,
            special_requirements: None,
            invoice: false,
            gateway: None,
            payment_details: None,
            preauth: false,
            settled: false,
            aborted: false,
            fulfilled: false,
            cancelled: false,
            approval_reason: None,
            cancel_reason: None,
            tracking_provider: None,
            tracking_code: None,
            created_at: now,
            updated_at: now,
            payment_confirmed_at: None,
            approval_requested_at: None,
            version: 0,
        }
    }

    /// Builds an order from a basket at checkout.
    ///
    /// The caller freezes the basket once the order is stored. The public
    /// reference is supplied by the caller (it comes from the store's
    /// sequence); the secret id is generated here.
    pub fn from_basket(
        basket: &Basket,
        config: &ShopConfig,
        customer: Option<CustomerId>,
        order_ref: String,
    ) -> Self {
        let totals = basket.totals(&config.default_country);
        let status = if basket.invoice() {
            OrderStatus::CheckoutInvoice
        } else if totals.total.is_zero() {
            OrderStatus::CheckoutZeroAmount
        } else {
            OrderStatus::Checkout
        };

        let billing = basket.billing_address().cloned();
        let mut order = Self::base(order_ref, status);
        order.customer = customer;
        order.full_name = billing.as_ref().map(Address::full_name).unwrap_or_default();
        order.email = billing.as_ref().and_then(|a| a.email.clone());
        order.telephone = billing.as_ref().and_then(|a| a.telephone.clone());
        order.billing = billing;
        order.delivery = basket.delivery_address().cloned();
        order.click_and_collect = basket.click_and_collect();
        order.basket_json = basket.to_json();
        order.sub_total = totals.sub_total;
        order.sub_total_before_delivery = totals.sub_total_before_delivery;
        order.delivery_charge = totals.delivery;
        order.total = totals.total;
        order.is_quote_only = totals.is_quote_only;
        order.voucher_code = basket.voucher().map(|v| v.code.clone());
        order.voucher_title = basket.voucher().map(|v| v.title.clone());
        order.voucher_discount = totals.discount;
        order.delivery_option_id = basket.delivery_option().map(|o| o.id);
        order.delivery_option_title = basket.delivery_option().map(|o| o.title.clone());
        order.finance_option_id = basket.finance().map(|f| f.option.id);
        order.loan_deposit = basket.finance().map(|f| f.deposit_percent);
        if order.finance_option_id.is_some() {
            order.loan_status = LoanStatus::Pending;
        }
        order.survey = basket.survey_answer().map(str::to_string);
        order.special_requirements = basket.special_requirements().map(str::to_string);
        order.invoice = basket.invoice();
        order
    }

    /// Creates an empty order for backend merchant data entry.
    pub fn create_empty_customer_not_present(order_ref: String) -> Self {
        Self::base(order_ref, OrderStatus::NewOrder)
    }

    /// Recomputes the denormalised snapshot from an attached basket.
    ///
    /// Permitted only while the order is editable (`new_order`).
    pub fn refresh_from_basket(&mut self, basket: &Basket, config: &ShopConfig) -> Result<()> {
        if !self.is_editable() {
            return Err(OrderError::NotEditable {
                status: self.status,
            });
        }
        let totals = basket.totals(&config.default_country);
        let billing = basket.billing_address().cloned();
        self.full_name = billing.as_ref().map(Address::full_name).unwrap_or_default();
        self.email = billing.as_ref().and_then(|a| a.email.clone());
        self.telephone = billing.as_ref().and_then(|a| a.telephone.clone());
        self.billing = billing;
        self.delivery = basket.delivery_address().cloned();
        self.click_and_collect = basket.click_and_collect();
        self.basket_json = basket.to_json();
        self.sub_total = totals.sub_total;
        self.sub_total_before_delivery = totals.sub_total_before_delivery;
        self.delivery_charge = totals.delivery;
        self.total = totals.total;
        self.is_quote_only = totals.is_quote_only;
        self.voucher_code = basket.voucher().map(|v| v.code.clone());
        self.voucher_title = basket.voucher().map(|v| v.title.clone());
        self.voucher_discount = totals.discount;
        self.delivery_option_id = basket.delivery_option().map(|o| o.id);
        self.delivery_option_title = basket.delivery_option().map(|o| o.title.clone());
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // -- Queries --

    /// Order contents may be edited only before any payment activity.
    pub fn is_editable(&self) -> bool {
        self.status.is_editable() && !self.fulfilled && self.payment_confirmed_at.is_none()
    }

    /// The amount still owed by the customer.
    pub fn remaining_balance(&self) -> Money {
        let unsettled = self.payment_confirmed_at.is_none()
            || matches!(
                self.approval_status,
                ApprovalStatus::Waiting | ApprovalStatus::Rejected | ApprovalStatus::Timeout
            );
        if unsettled { self.total } else { Money::zero() }
    }

    /// The customer-visible status URL path.
    pub fn public_url(&self) -> String {
        format!("/order/{}/", self.secret_id)
    }

    // -- Transitions --

    /// Moves the order to `target`, enforcing the transition table and
    /// the approval freeze.
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(target, self.click_and_collect) {
            return Err(OrderError::IllegalStateTransition {
                from: self.status,
                to: target,
            });
        }
        // A refused approval freezes the order at the payment stage.
        if target == OrderStatus::Processing && self.approval_status.is_refused() {
            return Err(OrderError::IllegalStateTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.touch();
        Ok(())
    }

    /// Records a successful gateway outcome.
    ///
    /// With `preauth` the funds are only reserved and the order enters
    /// the approval-waiting state.
    pub fn confirm_payment(&mut self, preauth: bool, payload: serde_json::Value) -> Result<()> {
        self.transition_to(OrderStatus::PaymentConfirmed)?;
        self.payment_confirmed_at = Some(Utc::now());
        self.preauth = preauth;
        if preauth {
            self.approval_status = ApprovalStatus::Waiting;
            self.approval_requested_at = Some(Utc::now());
        }
        self.record_payment_details(payload);
        Ok(())
    }

    /// Records a declined gateway outcome.
    pub fn decline_payment(&mut self, payload: serde_json::Value) -> Result<()> {
        self.transition_to(OrderStatus::PaymentDeclined)?;
        self.record_payment_details(payload);
        Ok(())
    }

    /// Records a gateway transport failure.
    pub fn fail_payment(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition_to(OrderStatus::PaymentError)?;
        self.record_payment_details(serde_json::json!({ "error": reason.into() }));
        Ok(())
    }

    /// Cancels the payment.
    ///
    /// Reachable from `payment_awaiting` (customer abandons) and, for
    /// gateways with a cancel capability, from `payment_confirmed`.
    pub fn cancel_payment(&mut self, reason: impl Into<String>) -> Result<()> {
        match self.status {
            OrderStatus::PaymentAwaiting | OrderStatus::PaymentConfirmed => {
                self.status = OrderStatus::PaymentCancelled;
                self.cancelled = true;
                self.cancel_reason = Some(reason.into());
                self.touch();
                Ok(())
            }
            from => Err(OrderError::IllegalStateTransition {
                from,
                to: OrderStatus::PaymentCancelled,
            }),
        }
    }

    /// Settles a waiting preauth.
    pub fn approve(&mut self) -> Result<()> {
        if self.approval_status != ApprovalStatus::Waiting {
            return Err(OrderError::ApprovalNotWaiting {
                actual: self.approval_status,
            });
        }
        self.approval_status = ApprovalStatus::Approved;
        self.settled = true;
        self.touch();
        Ok(())
    }

    /// Rejects a waiting preauth, aborting the reservation.
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.approval_status != ApprovalStatus::Waiting {
            return Err(OrderError::ApprovalNotWaiting {
                actual: self.approval_status,
            });
        }
        self.approval_status = ApprovalStatus::Rejected;
        self.aborted = true;
        self.approval_reason = Some(reason.into());
        self.touch();
        Ok(())
    }

    /// Times out a waiting preauth; driven by the background sweeper.
    pub fn timeout_approval(&mut self) -> Result<()> {
        if self.approval_status != ApprovalStatus::Waiting {
            return Err(OrderError::ApprovalNotWaiting {
                actual: self.approval_status,
            });
        }
        self.approval_status = ApprovalStatus::Timeout;
        self.aborted = true;
        self.touch();
        Ok(())
    }

    /// Marks the order fulfilled with the gateway. Irreversible.
    pub fn mark_fulfilled(&mut self) -> Result<()> {
        if self.fulfilled {
            return Err(OrderError::AlreadyFulfilled);
        }
        if !self.status.is_successful() {
            return Err(OrderError::IllegalStateTransition {
                from: self.status,
                to: self.status,
            });
        }
        self.fulfilled = true;
        self.touch();
        Ok(())
    }

    /// Records shipment tracking against a configured provider.
    pub fn set_tracking(
        &mut self,
        provider: &str,
        code: impl Into<String>,
        config: &ShopConfig,
    ) -> Result<()> {
        if config.tracking_provider(provider).is_none() {
            return Err(OrderError::UnknownTrackingProvider {
                name: provider.to_string(),
            });
        }
        self.tracking_provider = Some(provider.to_string());
        self.tracking_code = Some(code.into());
        self.touch();
        Ok(())
    }

    /// Merges gateway payload into the stored payment details.
    pub fn record_payment_details(&mut self, payload: serde_json::Value) {
        match (&mut self.payment_details, payload) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(new)) => {
                existing.extend(new);
            }
            (details, payload) => *details = Some(payload),
        }
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket::BasketItem;
    use catalog::ProductId;
    use std::collections::{BTreeMap, BTreeSet};

    fn config() -> ShopConfig {
        ShopConfig::default()
    }

    fn priced_basket() -> Basket {
        let mut basket = Basket::new();
        basket
            .add_item(
                BasketItem {
                    id: basket::LineId::new(),
                    product_id: ProductId::new(),
                    title: "Widget".to_string(),
                    quantity: 2,
                    unit_price: Money::from_major(50),
                    sku_id: None,
                    sku_code: None,
                    variety_option_ids: BTreeSet::new(),
                    labels: BTreeMap::new(),
                    custom: BTreeMap::new(),
                    categories: Vec::new(),
                    collection_only: false,
                    exempt_from_free_delivery: false,
                    exempt_from_discount: false,
                },
                99,
            )
            .unwrap();
        basket
            .set_billing_address(Address {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                line1: "1 High Street".to_string(),
                city: "London".to_string(),
                postcode: "N1 1AA".to_string(),
                country: Some(common::Country::new("GB")),
                email: Some("ada@example.com".to_string()),
                ..Address::default()
            })
            .unwrap();
        basket
    }

    fn awaiting_order() -> Order {
        let mut order = Order::from_basket(&priced_basket(), &config(), None, "2508001".into());
        order.transition_to(OrderStatus::PaymentAwaiting).unwrap();
        order
    }

    #[test]
    fn test_from_basket_snapshots() {
        let basket = priced_basket();
        let order = Order::from_basket(&basket, &config(), None, "2508001".into());

        assert_eq!(order.status, OrderStatus::Checkout);
        assert_eq!(order.sub_total, Money::from_major(100));
        assert_eq!(order.total, Money::from_major(100));
        assert_eq!(order.full_name, "Ada Lovelace");
        assert_eq!(order.email.as_deref(), Some("ada@example.com"));
        assert!(order.basket_json.is_object());
        assert_eq!(order.order_ref, "2508001");
        assert!(!order.secret_id.is_empty());
    }

    #[test]
    fn test_invoice_basket_routes_to_invoice_checkout() {
        let mut basket = priced_basket();
        basket.set_invoice(true).unwrap();
        let order = Order::from_basket(&basket, &config(), None, "1".into());
        assert_eq!(order.status, OrderStatus::CheckoutInvoice);
    }

    #[test]
    fn test_empty_basket_is_zero_amount() {
        let basket = Basket::new();
        let order = Order::from_basket(&basket, &config(), None, "1".into());
        assert_eq!(order.status, OrderStatus::CheckoutZeroAmount);
    }

    #[test]
    fn test_secret_ids_differ_between_orders() {
        let basket = priced_basket();
        let a = Order::from_basket(&basket, &config(), None, "1".into());
        let b = Order::from_basket(&basket, &config(), None, "2".into());
        assert_ne!(a.secret_id, b.secret_id);
        assert!(a.secret_id.len() >= 22);
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let mut order = Order::from_basket(&priced_basket(), &config(), None, "1".into());
        let result = order.transition_to(OrderStatus::Shipped);
        assert!(matches!(
            result,
            Err(OrderError::IllegalStateTransition { .. })
        ));
        assert_eq!(order.status, OrderStatus::Checkout);
    }

    #[test]
    fn test_confirm_payment_plain() {
        let mut order = awaiting_order();
        order
            .confirm_payment(false, serde_json::json!({"txn": "T1"}))
            .unwrap();

        assert_eq!(order.status, OrderStatus::PaymentConfirmed);
        assert_eq!(order.approval_status, ApprovalStatus::None);
        assert!(order.payment_confirmed_at.is_some());
        assert!(!order.preauth);
        assert_eq!(order.remaining_balance(), Money::zero());
    }

    #[test]
    fn test_confirm_payment_preauth_waits_for_approval() {
        let mut order = awaiting_order();
        order
            .confirm_payment(true, serde_json::json!({"txn": "T1"}))
            .unwrap();

        assert_eq!(order.approval_status, ApprovalStatus::Waiting);
        assert!(order.preauth);
        // Funds reserved but not settled; the balance is still owed.
        assert_eq!(order.remaining_balance(), order.total);

        order.approve().unwrap();
        assert_eq!(order.approval_status, ApprovalStatus::Approved);
        assert!(order.settled);
        assert_eq!(order.remaining_balance(), Money::zero());

        // Approve is not repeatable, and reject after approve fails.
        assert!(matches!(
            order.approve(),
            Err(OrderError::ApprovalNotWaiting { .. })
        ));
        assert!(matches!(
            order.reject("late"),
            Err(OrderError::ApprovalNotWaiting { .. })
        ));
    }

    #[test]
    fn test_rejected_approval_freezes_at_payment_stage() {
        let mut order = awaiting_order();
        order.confirm_payment(true, serde_json::Value::Null).unwrap();
        order.reject("suspected fraud").unwrap();

        assert!(order.aborted);
        assert_eq!(order.approval_reason.as_deref(), Some("suspected fraud"));
        let result = order.transition_to(OrderStatus::Processing);
        assert!(matches!(
            result,
            Err(OrderError::IllegalStateTransition { .. })
        ));
        assert_eq!(order.remaining_balance(), order.total);
    }

    #[test]
    fn test_full_lifecycle_to_shipped() {
        let mut order = awaiting_order();
        order.confirm_payment(false, serde_json::Value::Null).unwrap();
        order.transition_to(OrderStatus::Processing).unwrap();
        order.transition_to(OrderStatus::PartiallyShipped).unwrap();
        order.transition_to(OrderStatus::Shipped).unwrap();
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_click_and_collect_lifecycle() {
        let mut order = awaiting_order();
        order.click_and_collect = true;
        order.confirm_payment(false, serde_json::Value::Null).unwrap();
        order.transition_to(OrderStatus::Processing).unwrap();

        assert!(matches!(
            order.transition_to(OrderStatus::Shipped),
            Err(OrderError::IllegalStateTransition { .. })
        ));
        order.transition_to(OrderStatus::ReadyToCollect).unwrap();
        order.transition_to(OrderStatus::Collected).unwrap();
    }

    #[test]
    fn test_cancel_from_awaiting_and_confirmed() {
        let mut order = awaiting_order();
        order.cancel_payment("changed my mind").unwrap();
        assert_eq!(order.status, OrderStatus::PaymentCancelled);
        assert!(order.cancelled);

        let mut order = awaiting_order();
        order.confirm_payment(false, serde_json::Value::Null).unwrap();
        order.cancel_payment("merchant refund").unwrap();
        assert_eq!(order.status, OrderStatus::PaymentCancelled);

        let mut order = Order::from_basket(&priced_basket(), &config(), None, "1".into());
        assert!(order.cancel_payment("too early").is_err());
    }

    #[test]
    fn test_fulfilment_is_irreversible() {
        let mut order = awaiting_order();
        order.confirm_payment(false, serde_json::Value::Null).unwrap();
        order.mark_fulfilled().unwrap();
        assert!(matches!(
            order.mark_fulfilled(),
            Err(OrderError::AlreadyFulfilled)
        ));
    }

    #[test]
    fn test_fulfilment_requires_successful_state() {
        let mut order = awaiting_order();
        assert!(order.mark_fulfilled().is_err());
    }

    #[test]
    fn test_tracking_provider_must_be_configured() {
        let mut order = awaiting_order();
        let mut config = config();
        assert!(matches!(
            order.set_tracking("dpd", "ABC123", &config),
            Err(OrderError::UnknownTrackingProvider { .. })
        ));

        config.tracking_providers.push(common::TrackingProvider {
            name: "dpd".to_string(),
            url: "https://track.example/dpd".to_string(),
        });
        order.set_tracking("dpd", "ABC123", &config).unwrap();
        assert_eq!(order.tracking_code.as_deref(), Some("ABC123"));
    }

    #[test]
    fn test_refresh_only_while_editable() {
        let mut order = Order::create_empty_customer_not_present("B1".into());
        assert_eq!(order.status, OrderStatus::NewOrder);
        order.refresh_from_basket(&priced_basket(), &config()).unwrap();
        assert_eq!(order.total, Money::from_major(100));

        order.transition_to(OrderStatus::PaymentAwaiting).unwrap();
        assert!(matches!(
            order.refresh_from_basket(&priced_basket(), &config()),
            Err(OrderError::NotEditable { .. })
        ));
    }

    #[test]
    fn test_payment_details_merge() {
        let mut order = awaiting_order();
        order.record_payment_details(serde_json::json!({"a": 1}));
        order.record_payment_details(serde_json::json!({"b": 2}));
        let details = order.payment_details.as_ref().unwrap();
        assert_eq!(details["a"], 1);
        assert_eq!(details["b"], 2);
    }

    #[test]
    fn test_public_url_uses_secret_id() {
        let order = awaiting_order();
        assert_eq!(order.public_url(), format!("/order/{}/", order.secret_id));
        assert!(!order.public_url().contains(&order.order_ref));
    }
}
