//! Order status and backend order-management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use catalog::{CatalogStore, VoucherUsage};
use common::Money;
use orders::{ApprovalStatus, Order, OrderStatus, OrderStore};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct OrderView {
    pub order_ref: String,
    pub status: OrderStatus,
    pub approval_status: ApprovalStatus,
    pub full_name: String,
    pub sub_total: Money,
    pub delivery: Money,
    pub discount: Money,
    pub total: Money,
    pub remaining_balance: Money,
    pub click_and_collect: bool,
    pub is_quote_only: bool,
    pub voucher_code: Option<String>,
    pub tracking_provider: Option<String>,
    pub tracking_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn order_view(order: &Order) -> OrderView {
    OrderView {
        order_ref: order.order_ref.clone(),
        status: order.status,
        approval_status: order.approval_status,
        full_name: order.full_name.clone(),
        sub_total: order.sub_total,
        delivery: order.delivery_charge,
        discount: order.voucher_discount,
        total: order.total,
        remaining_balance: order.remaining_balance(),
        click_and_collect: order.click_and_collect,
        is_quote_only: order.is_quote_only,
        voucher_code: order.voucher_code.clone(),
        tracking_provider: order.tracking_provider.clone(),
        tracking_code: order.tracking_code.clone(),
        created_at: order.created_at,
    }
}

async fn load_by_ref<C, S>(state: &AppState<C, S>, order_ref: &str) -> Result<Order, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    state
        .orders
        .get_by_ref(order_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_ref} not found")))
}

/// GET /order/:secret_id — the customer-visible order status page.
///
/// Orders are only addressable by their secret id here; the public
/// reference never appears in URLs.
#[tracing::instrument(skip(state, secret_id))]
pub async fn get_by_secret<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(secret_id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let order = state
        .orders
        .get_by_secret(&secret_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("order not found".to_string()))?;
    Ok(Json(order_view(&order)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// GET /orders — recent orders for the backend.
pub async fn list_recent<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let orders = state.orders.recent(query.limit).await?;
    Ok(Json(orders.iter().map(order_view).collect()))
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

/// POST /orders/:order_ref/approve — settle a waiting preauth.
#[tracing::instrument(skip(state))]
pub async fn approve<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let order = load_by_ref(&state, &order_ref).await?;
    let order = state.coordinator.approve(order.id).await?;
    Ok(Json(order_view(&order)))
}

/// POST /orders/:order_ref/reject — abort a waiting preauth.
#[tracing::instrument(skip(state, req))]
pub async fn reject<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let order = load_by_ref(&state, &order_ref).await?;
    let order = state.coordinator.reject(order.id, &req.reason).await?;
    Ok(Json(order_view(&order)))
}

/// POST /orders/:order_ref/cancel — cancel a captured payment.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let order = load_by_ref(&state, &order_ref).await?;
    let order = state.coordinator.cancel(order.id, &req.reason).await?;
    Ok(Json(order_view(&order)))
}

/// POST /orders/:order_ref/fulfil — notify the gateway of fulfilment.
#[tracing::instrument(skip(state))]
pub async fn fulfil<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let order = load_by_ref(&state, &order_ref).await?;
    let order = state.coordinator.fulfil(order.id).await?;
    Ok(Json(order_view(&order)))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// POST /orders/:order_ref/status — merchant-driven fulfilment
/// transitions (processing, shipped, ready to collect, ...).
#[tracing::instrument(skip(state, req))]
pub async fn update_status<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let mut order = load_by_ref(&state, &order_ref).await?;
    order.transition_to(req.status)?;
    let order = state.orders.update(order).await?;
    Ok(Json(order_view(&order)))
}

#[derive(Deserialize)]
pub struct TrackingRequest {
    pub provider: String,
    pub code: String,
}

/// POST /orders/:order_ref/tracking — record shipment tracking.
#[tracing::instrument(skip(state, req))]
pub async fn set_tracking<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
    Json(req): Json<TrackingRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let mut order = load_by_ref(&state, &order_ref).await?;
    order.set_tracking(&req.provider, req.code, &state.config)?;
    let order = state.orders.update(order).await?;
    Ok(Json(order_view(&order)))
}
