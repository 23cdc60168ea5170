//! Checkout and gateway-callback endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use basket::session::DEFAULT_PREFIX;
use catalog::{CatalogStore, VoucherUsage};
use common::Money;
use orders::{CustomerId, Order, OrderStatus, OrderStore};
use payment::CallbackOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::baskets::session_from;

#[derive(Deserialize, Default)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_ref: String,
    pub status: OrderStatus,
    pub total: Money,
    /// Customer-visible status page.
    pub url: String,
    /// Where to send the customer to pay, when a gateway is involved.
    pub redirect: Option<String>,
}

/// POST /checkout — snapshot the session basket into an order and start
/// the appropriate placement route.
#[tracing::instrument(skip(state, headers, req))]
pub async fn place_order<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<(axum::http::StatusCode, Json<CheckoutResponse>), ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;

    state.baskets.validate_for_checkout(&basket)?;

    let order_ref = state.orders.allocate_order_ref(&state.config).await?;
    let customer = req.customer_id.map(CustomerId::from_uuid);
    let order = Order::from_basket(&basket, &state.config, customer, order_ref);
    let order = state.orders.insert(order).await?;
    basket.freeze();
    drop(basket);

    metrics::counter!("shop_checkouts_total").increment(1);

    // Zero-amount and invoice orders bypass the gateway entirely.
    let (order, redirect) = match order.status {
        OrderStatus::CheckoutInvoice => (state.coordinator.place_invoice(order.id).await?, None),
        OrderStatus::CheckoutZeroAmount => {
            (state.coordinator.place_zero_amount(order.id).await?, None)
        }
        _ => {
            let (order, registration) = state.coordinator.register(order.id).await?;
            (order, Some(registration.redirect))
        }
    };

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CheckoutResponse {
            url: order.public_url(),
            order_ref: order.order_ref.clone(),
            status: order.status,
            total: order.total,
            redirect,
        }),
    ))
}

#[derive(Deserialize)]
pub struct GatewayCallbackRequest {
    /// `authorised`, `declined` or `error`.
    pub result: String,
    /// Gateway-specific payload, persisted on the order.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct GatewayCallbackResponse {
    pub order_ref: String,
    pub status: OrderStatus,
}

/// POST /gateway/callback/:order_ref — the gateway's asynchronous
/// outcome notification.
#[tracing::instrument(skip(state, req), fields(order_ref = %order_ref))]
pub async fn gateway_callback<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(order_ref): Path<String>,
    Json(req): Json<GatewayCallbackRequest>,
) -> Result<Json<GatewayCallbackResponse>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let outcome = match req.result.as_str() {
        "authorised" => CallbackOutcome::Authorised,
        "declined" => CallbackOutcome::Declined,
        "error" => CallbackOutcome::Error,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown callback result: {other}"
            )));
        }
    };

    let order = state
        .orders
        .get_by_ref(&order_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_ref} not found")))?;
    let order = state.coordinator.confirm(order.id, outcome, req.payload).await?;

    Ok(Json(GatewayCallbackResponse {
        order_ref: order.order_ref.clone(),
        status: order.status,
    }))
}
