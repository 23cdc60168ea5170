//! Basket endpoints.
//!
//! Baskets are session-scoped: handlers key the session store by the
//! `X-Session-Id` header. Each handler holds the session's basket lock
//! across its catalog calls, so concurrent requests on one session
//! serialise.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use basket::{Address, Basket, LineId, Totals, session::DEFAULT_PREFIX};
use catalog::{
    CatalogStore, DeliveryOptionId, FinanceOptionId, ProductId, VarietyOptionId, VoucherUsage,
};
use common::Money;
use orders::OrderStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

/// Session key for requests without an `X-Session-Id` header.
const ANONYMOUS_SESSION: &str = "anonymous";

pub(crate) fn session_from(headers: &HeaderMap) -> String {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub variety_option_ids: Vec<Uuid>,
    #[serde(default)]
    pub labels: BTreeMap<Uuid, String>,
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct DeliverySelectionRequest {
    #[serde(default)]
    pub delivery_option_id: Option<Uuid>,
    #[serde(default)]
    pub click_and_collect: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VoucherRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct FinanceRequest {
    pub finance_option_id: Uuid,
    pub deposit_percent: Decimal,
}

// -- Response types --

#[derive(Serialize)]
pub struct LineView {
    pub id: LineId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub sku: Option<String>,
}

#[derive(Serialize)]
pub struct BasketView {
    pub items: Vec<LineView>,
    pub totals: Totals,
    pub click_and_collect: bool,
    pub collection_only: bool,
    pub frozen: bool,
    pub voucher_code: Option<String>,
    pub delivery_option: Option<String>,
}

pub(crate) fn basket_view(basket: &Basket, totals: Totals) -> BasketView {
    BasketView {
        items: basket
            .items()
            .iter()
            .map(|item| LineView {
                id: item.id,
                product_id: item.product_id,
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
                sku: item.sku_code.clone(),
            })
            .collect(),
        totals,
        click_and_collect: basket.click_and_collect(),
        collection_only: basket.is_collection_only(),
        frozen: basket.is_frozen(),
        voucher_code: basket.voucher().map(|v| v.code.clone()),
        delivery_option: basket.delivery_option().map(|o| o.title.clone()),
    }
}

// -- Handlers --

/// GET /basket — the session's basket with its totals.
pub async fn view<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// POST /basket/items — add a product to the basket.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<(axum::http::StatusCode, Json<BasketView>), ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;

    let options: Vec<VarietyOptionId> = req
        .variety_option_ids
        .iter()
        .copied()
        .map(VarietyOptionId::from_uuid)
        .collect();
    let labels = req
        .labels
        .into_iter()
        .map(|(k, v)| (VarietyOptionId::from_uuid(k), v))
        .collect();

    state
        .baskets
        .add(
            &mut basket,
            ProductId::from_uuid(req.product_id),
            req.quantity,
            &options,
            labels,
            req.custom,
        )
        .await?;

    let totals = state.baskets.totals(&basket);
    Ok((
        axum::http::StatusCode::CREATED,
        Json(basket_view(&basket, totals)),
    ))
}

/// PATCH /basket/items/:line_id — change a line's quantity.
pub async fn update_item<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Path(line_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    let line = find_line(&basket, line_id)?;
    state
        .baskets
        .update_quantity(&mut basket, line, req.quantity)
        .await?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// DELETE /basket/items/:line_id — remove a line.
pub async fn remove_item<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Path(line_id): Path<Uuid>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    let line = find_line(&basket, line_id)?;
    state.baskets.remove(&mut basket, line).await?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

fn find_line(basket: &Basket, raw: Uuid) -> Result<LineId, ApiError> {
    basket
        .items()
        .iter()
        .map(|i| i.id)
        .find(|id| id.as_uuid() == raw)
        .ok_or_else(|| ApiError::NotFound("no such item in the basket".to_string()))
}

/// PUT /basket/billing-address
pub async fn set_billing_address<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(address): Json<Address>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    state.baskets.set_billing_address(&mut basket, address)?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// PUT /basket/delivery-address
pub async fn set_delivery_address<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(address): Json<Address>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    state.baskets.set_delivery_address(&mut basket, address).await?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// PUT /basket/delivery-option — choose a delivery method or
/// click-and-collect.
pub async fn set_delivery_option<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(req): Json<DeliverySelectionRequest>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;

    if let Some(click_and_collect) = req.click_and_collect {
        basket.set_click_and_collect(click_and_collect)?;
    }
    if let Some(id) = req.delivery_option_id {
        state
            .baskets
            .set_delivery_option(&mut basket, DeliveryOptionId::from_uuid(id))
            .await?;
    }

    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// POST /basket/voucher — apply a voucher code.
#[tracing::instrument(skip(state, headers))]
pub async fn apply_voucher<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(req): Json<VoucherRequest>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    state.baskets.apply_voucher(&mut basket, &req.code).await?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// DELETE /basket/voucher — remove the applied voucher.
pub async fn remove_voucher<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    basket.clear_voucher()?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}

/// POST /basket/finance — take a finance option with a deposit.
pub async fn apply_finance<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
    Json(req): Json<FinanceRequest>,
) -> Result<Json<BasketView>, ApiError>
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let session = session_from(&headers);
    let mut basket = state.sessions.lock(&session, DEFAULT_PREFIX).await;
    state
        .baskets
        .apply_finance_option(
            &mut basket,
            FinanceOptionId::from_uuid(req.finance_option_id),
            req.deposit_percent,
        )
        .await?;
    let totals = state.baskets.totals(&basket);
    Ok(Json(basket_view(&basket, totals)))
}
