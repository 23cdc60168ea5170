//! In-memory order store for tests and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{OrderError, Result};
use crate::ids::{CustomerId, OrderId};
use crate::order::Order;
use crate::status::ApprovalStatus;
use crate::store::OrderStore;

#[derive(Default)]
struct OrderState {
    orders: HashMap<OrderId, Order>,
    sequence: u64,
}

/// In-memory order store implementation.
///
/// Version checks on `update` give the same serialisation guarantee the
/// PostgreSQL implementation gets from row locks: of two concurrent
/// writers, the second observes a conflict.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, mut order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(OrderError::DuplicateIdentifier {
                value: order.id.to_string(),
            });
        }
        if state
            .orders
            .values()
            .any(|o| o.order_ref == order.order_ref || o.secret_id == order.secret_id)
        {
            return Err(OrderError::DuplicateIdentifier {
                value: order.order_ref.clone(),
            });
        }
        order.version = 1;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_by_secret(&self, secret_id: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.secret_id == secret_id)
            .cloned())
    }

    async fn get_by_ref(&self, order_ref: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.order_ref == order_ref)
            .cloned())
    }

    async fn update(&self, mut order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get(&order.id)
            .ok_or_else(|| OrderError::NotFound {
                id: order.id.to_string(),
            })?;
        if stored.version != order.version {
            return Err(OrderError::Conflict {
                expected: order.version,
                actual: stored.version,
            });
        }
        order.version += 1;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn next_sequence(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        state.sequence += 1;
        Ok(state.sequence)
    }

    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.customer == Some(customer))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn approvals_waiting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| {
                o.approval_status == ApprovalStatus::Waiting
                    && o.approval_requested_at
                        .map(|at| at < cutoff)
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn count_voucher_uses(&self, code: &str) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.voucher_code.as_deref() == Some(code) && o.status.is_successful())
            .count() as u64)
    }
}

#[async_trait]
impl catalog::VoucherUsage for InMemoryOrderStore {
    async fn successful_uses(&self, code: &str) -> catalog::error::Result<u64> {
        self.count_voucher_uses(code)
            .await
            .map_err(|e| catalog::CatalogError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use crate::status::OrderStatus;
    use common::{OrderIdFormat, ShopConfig};

    fn order() -> Order {
        Order::create_empty_customer_not_present(format!("REF-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_insert_and_lookups() {
        let store = InMemoryOrderStore::new();
        let stored = store.insert(order()).await.unwrap();
        assert_eq!(stored.version, 1);

        assert!(store.get(stored.id).await.unwrap().is_some());
        assert!(
            store
                .get_by_secret(&stored.secret_id)
                .await
                .unwrap()
                .is_some()
        );
        assert!(store.get_by_ref(&stored.order_ref).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_ref_rejected() {
        let store = InMemoryOrderStore::new();
        let first = store.insert(order()).await.unwrap();

        let mut clash = order();
        clash.order_ref = first.order_ref.clone();
        assert!(matches!(
            store.insert(clash).await,
            Err(OrderError::DuplicateIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryOrderStore::new();
        let stored = store.insert(order()).await.unwrap();

        // First writer wins.
        let updated = store.update(stored.clone()).await.unwrap();
        assert_eq!(updated.version, 2);

        // Second writer with the stale copy loses.
        assert!(matches!(
            store.update(stored).await,
            Err(OrderError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_sequence_is_monotonic() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.next_sequence().await.unwrap(), 1);
        assert_eq!(store.next_sequence().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_allocate_order_ref_numeric() {
        let store = InMemoryOrderStore::new();
        let config = ShopConfig {
            order_id_format: OrderIdFormat::Seq,
            order_id_prefix: Some("WEB-".to_string()),
            ..ShopConfig::default()
        };
        assert_eq!(store.allocate_order_ref(&config).await.unwrap(), "WEB-1");
        assert_eq!(store.allocate_order_ref(&config).await.unwrap(), "WEB-2");
    }

    #[tokio::test]
    async fn test_voucher_usage_counts_successful_only() {
        let store = InMemoryOrderStore::new();

        let mut successful = order();
        successful.voucher_code = Some("SAVE10".to_string());
        successful.status = OrderStatus::PaymentConfirmed;
        store.insert(successful).await.unwrap();

        let mut pending = order();
        pending.voucher_code = Some("SAVE10".to_string());
        pending.status = OrderStatus::PaymentAwaiting;
        store.insert(pending).await.unwrap();

        let mut other = order();
        other.voucher_code = Some("OTHER".to_string());
        other.status = OrderStatus::Shipped;
        store.insert(other).await.unwrap();

        assert_eq!(store.count_voucher_uses("SAVE10").await.unwrap(), 1);
        assert_eq!(store.count_voucher_uses("OTHER").await.unwrap(), 1);
        assert_eq!(store.count_voucher_uses("NONE").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_approvals_waiting_before() {
        let store = InMemoryOrderStore::new();

        let mut waiting = order();
        waiting.approval_status = ApprovalStatus::Waiting;
        waiting.approval_requested_at = Some(Utc::now() - chrono::Duration::hours(100));
        let waiting = store.insert(waiting).await.unwrap();

        let mut fresh = order();
        fresh.approval_status = ApprovalStatus::Waiting;
        fresh.approval_requested_at = Some(Utc::now());
        store.insert(fresh).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(72);
        let stale = store.approvals_waiting_before(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, waiting.id);
    }
}
