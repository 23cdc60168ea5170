//! PostgreSQL order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orders::{CustomerId, Order, OrderError, OrderId, OrderStore, error::Result};
use sqlx::{PgPool, Row};

/// Postgres error code for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

fn storage(err: sqlx::Error) -> OrderError {
    OrderError::Storage(err.to_string())
}

fn from_doc(doc: serde_json::Value) -> Result<Order> {
    Ok(serde_json::from_value(doc)?)
}

fn to_doc(order: &Order) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(order)?)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

/// PostgreSQL-backed order store.
///
/// The order row is the single source of truth. `update` takes a
/// row-level lock (`SELECT ... FOR UPDATE`) inside a transaction and
/// verifies the caller's version, so state transitions for one order are
/// serialised; the second of two concurrent writers observes a conflict.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_where(&self, condition: &str, value: &str) -> Result<Option<Order>> {
        let query = format!("SELECT doc FROM orders WHERE {condition} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .transpose()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, mut order: Order) -> Result<Order> {
        order.version = 1;
        let doc = to_doc(&order)?;
        let result = sqlx::query(
            "INSERT INTO orders
                 (id, order_ref, secret_id, status, approval_status, customer_id,
                  voucher_code, approval_requested_at, created_at, version, doc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_ref)
        .bind(&order.secret_id)
        .bind(order.status.as_str())
        .bind(order.approval_status.as_str())
        .bind(order.customer.map(|c| c.as_uuid()))
        .bind(&order.voucher_code)
        .bind(order.approval_requested_at)
        .bind(order.created_at)
        .bind(order.version as i64)
        .bind(&doc)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(order),
            Err(err) if is_unique_violation(&err) => Err(OrderError::DuplicateIdentifier {
                value: order.order_ref.clone(),
            }),
            Err(err) => Err(storage(err)),
        }
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .transpose()
    }

    async fn get_by_secret(&self, secret_id: &str) -> Result<Option<Order>> {
        self.fetch_where("secret_id", secret_id).await
    }

    async fn get_by_ref(&self, order_ref: &str) -> Result<Option<Order>> {
        self.fetch_where("order_ref", order_ref).await
    }

    async fn update(&self, mut order: Order) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Row lock: concurrent writers to one order queue here.
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;
        let actual = actual.ok_or_else(|| OrderError::NotFound {
            id: order.id.to_string(),
        })?;
        if actual as u64 != order.version {
            return Err(OrderError::Conflict {
                expected: order.version,
                actual: actual as u64,
            });
        }

        order.version += 1;
        let doc = to_doc(&order)?;
        sqlx::query(
            "UPDATE orders SET
                 status = $2, approval_status = $3, voucher_code = $4,
                 approval_requested_at = $5, version = $6, doc = $7
             WHERE id = $1",
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.approval_status.as_str())
        .bind(&order.voucher_code)
        .bind(order.approval_requested_at)
        .bind(order.version as i64)
        .bind(&doc)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(order)
    }

    async fn next_sequence(&self) -> Result<u64> {
        let next: i64 = sqlx::query_scalar("SELECT nextval('order_ref_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(next as u64)
    }

    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT doc FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter()
            .map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .collect()
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT doc FROM orders ORDER BY created_at DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.into_iter()
            .map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .collect()
    }

    async fn approvals_waiting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT doc FROM orders
             WHERE approval_status = 'waiting' AND approval_requested_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter()
            .map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .collect()
    }

    async fn count_voucher_uses(&self, code: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders
             WHERE voucher_code = $1
               AND status IN ('payment_confirmed', 'placed_invoice', 'placed_zero_amount',
                              'processing', 'partially_shipped', 'shipped',
                              'ready_to_collect', 'collected')",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl catalog::VoucherUsage for PostgresOrderStore {
    async fn successful_uses(&self, code: &str) -> catalog::error::Result<u64> {
        self.count_voucher_uses(code)
            .await
            .map_err(|e| catalog::CatalogError::Storage(e.to_string()))
    }
}
