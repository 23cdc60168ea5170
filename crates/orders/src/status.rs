//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// new_order ──────────────┐
/// checkout ───────────────┴─► payment_awaiting ─► payment_confirmed ─┐
/// checkout_invoice ─────────► placed_invoice ───────────────────────┤
/// checkout_zero_amount ─────► placed_zero_amount ────────────────────┤
///                                                                    ▼
///                payment_awaiting ─► declined | error | cancelled  processing
///                                                                    │
///                          ┌─────────────────────────────────────────┤
///                          ▼                                         ▼
///                 ready_to_collect ─► collected     partially_shipped ─► shipped
/// ```
/// (processing branches on click-and-collect.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created empty via the backend; not yet priced.
    #[default]
    NewOrder,

    /// Priced; awaiting customer payment.
    Checkout,

    /// Priced; invoice route, awaiting the merchant to place.
    CheckoutInvoice,

    /// Priced at zero; awaiting placement.
    CheckoutZeroAmount,

    /// Gateway registered; waiting for the outcome.
    PaymentAwaiting,

    /// Placed via gateway; money captured or reserved.
    PaymentConfirmed,

    /// Placed as invoice.
    PlacedInvoice,

    /// Placed as zero-amount.
    PlacedZeroAmount,

    /// Gateway rejected the payment (terminal).
    PaymentDeclined,

    /// Gateway transport or other failure.
    PaymentError,

    /// Customer or merchant cancelled (terminal).
    PaymentCancelled,

    /// Merchant working on the order.
    Processing,

    /// Some lines shipped.
    PartiallyShipped,

    /// All lines shipped (terminal).
    Shipped,

    /// Click-and-collect order ready in store.
    ReadyToCollect,

    /// Click-and-collect order collected (terminal).
    Collected,
}

impl OrderStatus {
    /// Returns true if `target` is a permitted next state.
    ///
    /// The processing fork depends on whether the order is
    /// click-and-collect.
    pub fn can_transition_to(&self, target: OrderStatus, click_and_collect: bool) -> bool {
        use OrderStatus::*;
        match (self, target) {
            (NewOrder | Checkout, PaymentAwaiting) => true,
            (CheckoutInvoice, PlacedInvoice) => true,
            (CheckoutZeroAmount, PlacedZeroAmount) => true,
            (
                PaymentAwaiting,
                PaymentConfirmed | PaymentDeclined | PaymentError | PaymentCancelled,
            ) => true,
            (PaymentConfirmed | PlacedInvoice | PlacedZeroAmount, Processing) => true,
            (Processing, ReadyToCollect) => click_and_collect,
            (Processing, PartiallyShipped | Shipped) => !click_and_collect,
            (PartiallyShipped, Shipped) => true,
            (ReadyToCollect, Collected) => true,
            _ => false,
        }
    }

    /// Returns true if order contents may still be edited in this state.
    pub fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::NewOrder)
    }

    /// Returns true for states before any payment activity.
    pub fn is_checkout_stage(&self) -> bool {
        matches!(
            self,
            OrderStatus::NewOrder
                | OrderStatus::Checkout
                | OrderStatus::CheckoutInvoice
                | OrderStatus::CheckoutZeroAmount
        )
    }

    /// Returns true for states where payment has succeeded or the order
    /// was placed without one. Voucher usage counts these orders.
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentConfirmed
                | OrderStatus::PlacedInvoice
                | OrderStatus::PlacedZeroAmount
                | OrderStatus::Processing
                | OrderStatus::PartiallyShipped
                | OrderStatus::Shipped
                | OrderStatus::ReadyToCollect
                | OrderStatus::Collected
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped
                | OrderStatus::Collected
                | OrderStatus::PaymentCancelled
                | OrderStatus::PaymentDeclined
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::NewOrder => "new_order",
            OrderStatus::Checkout => "checkout",
            OrderStatus::CheckoutInvoice => "checkout_invoice",
            OrderStatus::CheckoutZeroAmount => "checkout_zero_amount",
            OrderStatus::PaymentAwaiting => "payment_awaiting",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::PlacedInvoice => "placed_invoice",
            OrderStatus::PlacedZeroAmount => "placed_zero_amount",
            OrderStatus::PaymentDeclined => "payment_declined",
            OrderStatus::PaymentError => "payment_error",
            OrderStatus::PaymentCancelled => "payment_cancelled",
            OrderStatus::Processing => "processing",
            OrderStatus::PartiallyShipped => "partially_shipped",
            OrderStatus::Shipped => "shipped",
            OrderStatus::ReadyToCollect => "ready_to_collect",
            OrderStatus::Collected => "collected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The orthogonal approval axis for deferred-capture payments.
///
/// A preauth registration reserves funds; the merchant then approves
/// (settles) or rejects (aborts). Rejected and timed-out orders stay at
/// the payment stage whatever their status field says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// No approval involved.
    #[default]
    None,

    /// Funds reserved; merchant decision pending.
    Waiting,

    /// Merchant approved; funds settled.
    Approved,

    /// Merchant rejected; reservation aborted (terminal).
    Rejected,

    /// Approval window elapsed; reservation aborted (terminal).
    Timeout,
}

impl ApprovalStatus {
    /// Returns true if the order may progress past the payment stage.
    pub fn allows_progress(&self) -> bool {
        matches!(self, ApprovalStatus::None | ApprovalStatus::Approved)
    }

    /// Returns true for rejected or timed-out approvals.
    pub fn is_refused(&self) -> bool {
        matches!(self, ApprovalStatus::Rejected | ApprovalStatus::Timeout)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::None => "none",
            ApprovalStatus::Waiting => "waiting",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
