//! Order storage trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ShopConfig;

use crate::error::{OrderError, Result};
use crate::ids::{CustomerId, OrderId, format_order_ref};
use crate::order::Order;

/// How many times an alpha reference is re-rolled on collision.
const ALPHA_REF_ATTEMPTS: usize = 5;

/// Storage for orders.
///
/// The store is the single source of truth for order state. Writers go
/// through `update` with the version they loaded; a stale version fails
/// with [`OrderError::Conflict`], which serialises concurrent transitions
/// on one order (the PostgreSQL implementation additionally takes a row
/// lock inside its transaction).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order. The public reference and secret id must be
    /// unused.
    async fn insert(&self, order: Order) -> Result<Order>;

    /// Loads an order by internal id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by its secret id (the customer status URL).
    async fn get_by_secret(&self, secret_id: &str) -> Result<Option<Order>>;

    /// Loads an order by its public reference.
    async fn get_by_ref(&self, order_ref: &str) -> Result<Option<Order>>;

    /// Persists a mutated order; fails on a stale version.
    async fn update(&self, order: Order) -> Result<Order>;

    /// Returns the next value of the monotonic order counter.
    async fn next_sequence(&self) -> Result<u64>;

    /// Orders for a customer, most recent first.
    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>>;

    /// The most recent orders, for backend listings.
    async fn recent(&self, limit: usize) -> Result<Vec<Order>>;

    /// Orders whose preauth approval has been waiting since before
    /// `cutoff`; consumed by the timeout sweeper.
    async fn approvals_waiting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;

    /// Number of successful orders referencing the voucher code.
    async fn count_voucher_uses(&self, code: &str) -> Result<u64>;

    /// Allocates an unused public order reference per the configured
    /// format.
    ///
    /// Alpha references are random, so collisions are re-rolled a few
    /// times before giving up.
    async fn allocate_order_ref(&self, config: &ShopConfig) -> Result<String> {
        for _ in 0..ALPHA_REF_ATTEMPTS {
            let sequence = self.next_sequence().await?;
            let candidate = format_order_ref(
                config.order_id_format,
                config.order_id_prefix.as_deref(),
                config.order_id_suffix.as_deref(),
                sequence,
                Utc::now(),
            );
            if self.get_by_ref(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(OrderError::Storage(
            "could not allocate a unique order reference".to_string(),
        ))
    }
}
