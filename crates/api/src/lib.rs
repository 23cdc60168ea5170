//! HTTP API for the shop checkout core.
//!
//! Exposes the basket, checkout, gateway-callback and order-status
//! surface over axum, with structured logging (tracing) and Prometheus
//! metrics. Storage is pluggable: any [`CatalogStore`] plus any
//! [`OrderStore`] that also counts voucher usage.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use basket::{BasketService, SessionStore};
use catalog::{CatalogStore, InMemoryCatalog, VoucherUsage};
use common::ShopConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{InMemoryOrderStore, OrderStore};
use payment::{GatewayRegistry, PaymentCoordinator, TestGateway};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<C, S> {
    pub catalog: Arc<C>,
    pub orders: Arc<S>,
    pub baskets: BasketService<C, S>,
    pub sessions: SessionStore,
    pub coordinator: Arc<PaymentCoordinator<S, C>>,
    pub config: ShopConfig,
}

impl<C: CatalogStore, S: OrderStore + VoucherUsage> AppState<C, S> {
    /// Wires the services over the given stores and gateway registry.
    pub fn new(
        catalog: Arc<C>,
        orders: Arc<S>,
        registry: GatewayRegistry,
        config: ShopConfig,
    ) -> Self {
        let baskets = BasketService::new(catalog.clone(), orders.clone(), config.clone());
        let coordinator = Arc::new(PaymentCoordinator::new(
            orders.clone(),
            catalog.clone(),
            registry,
            config.clone(),
        ));
        Self {
            catalog,
            orders,
            baskets,
            sessions: SessionStore::new(),
            coordinator,
            config,
        }
    }
}

/// Creates in-memory state with the built-in test gateway.
pub fn create_default_state(
    config: ShopConfig,
) -> Arc<AppState<InMemoryCatalog, InMemoryOrderStore>> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let orders = Arc::new(InMemoryOrderStore::new());
    let mut registry = GatewayRegistry::new();
    let gateway = if config.preauth {
        TestGateway::new(1).with_preauth().with_fulfilment()
    } else {
        TestGateway::new(1).with_cancel().with_fulfilment()
    };
    registry.register(Arc::new(gateway));
    Arc::new(AppState::new(catalog, orders, registry, config))
}

/// Creates the axum application router with all routes and shared state.
pub fn create_app<C, S>(state: Arc<AppState<C, S>>, metrics_handle: PrometheusHandle) -> Router
where
    C: CatalogStore + 'static,
    S: OrderStore + VoucherUsage + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Basket
        .route("/basket", get(routes::baskets::view::<C, S>))
        .route("/basket/items", post(routes::baskets::add_item::<C, S>))
        .route(
            "/basket/items/{line_id}",
            patch(routes::baskets::update_item::<C, S>),
        )
        .route(
            "/basket/items/{line_id}",
            delete(routes::baskets::remove_item::<C, S>),
        )
        .route(
            "/basket/billing-address",
            put(routes::baskets::set_billing_address::<C, S>),
        )
        .route(
            "/basket/delivery-address",
            put(routes::baskets::set_delivery_address::<C, S>),
        )
        .route(
            "/basket/delivery-option",
            put(routes::baskets::set_delivery_option::<C, S>),
        )
        .route("/basket/voucher", post(routes::baskets::apply_voucher::<C, S>))
        .route(
            "/basket/voucher",
            delete(routes::baskets::remove_voucher::<C, S>),
        )
        .route("/basket/finance", post(routes::baskets::apply_finance::<C, S>))
        // Checkout & gateway callback
        .route("/checkout", post(routes::checkout::place_order::<C, S>))
        .route(
            "/gateway/callback/{order_ref}",
            post(routes::checkout::gateway_callback::<C, S>),
        )
        // Customer-visible order status; keyed by secret id only.
        .route("/order/{secret_id}", get(routes::orders::get_by_secret::<C, S>))
        // Backend order management
        .route("/orders", get(routes::orders::list_recent::<C, S>))
        .route(
            "/orders/{order_ref}/approve",
            post(routes::orders::approve::<C, S>),
        )
        .route(
            "/orders/{order_ref}/reject",
            post(routes::orders::reject::<C, S>),
        )
        .route(
            "/orders/{order_ref}/cancel",
            post(routes::orders::cancel::<C, S>),
        )
        .route(
            "/orders/{order_ref}/fulfil",
            post(routes::orders::fulfil::<C, S>),
        )
        .route(
            "/orders/{order_ref}/status",
            post(routes::orders::update_status::<C, S>),
        )
        .route(
            "/orders/{order_ref}/tracking",
            post(routes::orders::set_tracking::<C, S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
