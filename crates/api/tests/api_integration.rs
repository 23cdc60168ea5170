//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use catalog::{
    CatalogStore, Category, DeliveryOption, Discount, InMemoryCatalog, Product, RegionTerms,
    Voucher,
};
use common::{Money, ShopConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::InMemoryOrderStore;
use rust_decimal::Decimal;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    state: Arc<api::AppState<InMemoryCatalog, InMemoryOrderStore>>,
}

fn setup() -> TestApp {
    let state = api::create_default_state(ShopConfig::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    TestApp { app, state }
}

/// Seeds a product and a UK courier option; returns (product, courier).
async fn seed_catalog(catalog: &InMemoryCatalog) -> (Product, DeliveryOption) {
    let category = catalog
        .save_category(Category::new("Chairs", "chairs"))
        .await
        .unwrap();
    let product = catalog
        .save_product(Product::new(
            "Widget",
            "widget",
            category.id,
            Money::from_major(50),
        ))
        .await
        .unwrap();
    let mut courier = DeliveryOption::new("Courier");
    courier.uk = RegionTerms::charged(Money::from_major(5));
    catalog.save_delivery_option(courier.clone()).await.unwrap();
    (product, courier)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-session-id", "test-session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-session-id", "test-session")
        .body(Body::empty())
        .unwrap()
}

fn address_body() -> serde_json::Value {
    serde_json::json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "line1": "1 High Street",
        "city": "London",
        "postcode": "N1 1AA",
        "country": "GB"
    })
}

/// Drives the basket through the full checkout surface; returns the
/// checkout response body.
async fn checkout_flow(test: &TestApp) -> serde_json::Value {
    let (product, courier) = seed_catalog(&test.state.catalog).await;

    let (status, _) = send(
        &test.app,
        json_request(
            "POST",
            "/basket/items",
            serde_json::json!({ "product_id": product.id, "quantity": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &test.app,
        json_request("PUT", "/basket/billing-address", address_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &test.app,
        json_request("PUT", "/basket/delivery-address", address_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &test.app,
        json_request(
            "PUT",
            "/basket/delivery-option",
            serde_json::json!({ "delivery_option_id": courier.id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &test.app,
        json_request("POST", "/checkout", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health_check() {
    let test = setup();
    let (status, body) = send(&test.app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let test = setup();
    let response = test
        .app
        .clone()
        .oneshot(get_request("/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_basket_lifecycle() {
    let test = setup();
    let (product, _) = seed_catalog(&test.state.catalog).await;

    // Empty basket.
    let (status, body) = send(&test.app, get_request("/basket")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    // Add twice: merges into one line of 3.
    for quantity in [1, 2] {
        let (status, _) = send(
            &test.app,
            json_request(
                "POST",
                "/basket/items",
                serde_json::json!({ "product_id": product.id, "quantity": quantity }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&test.app, get_request("/basket")).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(body["totals"]["sub_total"], "150.00");

    // Update then remove the line.
    let line_id = items[0]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &test.app,
        json_request(
            "PATCH",
            &format!("/basket/items/{line_id}"),
            serde_json::json!({ "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["quantity"], 1);

    let (status, body) = send(
        &test.app,
        json_request(
            "DELETE",
            &format!("/basket/items/{line_id}"),
            serde_json::Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_product_rejected() {
    let test = setup();
    let (status, body) = send(
        &test.app,
        json_request(
            "POST",
            "/basket/items",
            serde_json::json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("not available"));
}

#[tokio::test]
async fn test_voucher_over_http() {
    let test = setup();
    let (product, _) = seed_catalog(&test.state.catalog).await;
    test.state
        .catalog
        .save_voucher(Voucher::new(
            "SAVE10",
            "10% off",
            Discount::Percentage(Decimal::from(10)),
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
        ))
        .await
        .unwrap();

    send(
        &test.app,
        json_request(
            "POST",
            "/basket/items",
            serde_json::json!({ "product_id": product.id, "quantity": 2 }),
        ),
    )
    .await;

    let (status, body) = send(
        &test.app,
        json_request("POST", "/basket/voucher", serde_json::json!({ "code": "save10" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["voucher_code"], "SAVE10");
    assert_eq!(body["totals"]["discount"], "10.00");

    let (status, _) = send(
        &test.app,
        json_request("POST", "/basket/voucher", serde_json::json!({ "code": "NOPE" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_and_callback_flow() {
    let test = setup();
    let body = checkout_flow(&test).await;

    assert_eq!(body["status"], "payment_awaiting");
    assert_eq!(body["total"], "105.00");
    let order_ref = body["order_ref"].as_str().unwrap().to_string();
    let url = body["url"].as_str().unwrap().to_string();
    assert!(body["redirect"].as_str().unwrap().contains("gateway.test"));
    assert!(!url.contains(&order_ref));

    // Gateway posts its outcome.
    let (status, body) = send(
        &test.app,
        json_request(
            "POST",
            &format!("/gateway/callback/{order_ref}"),
            serde_json::json!({ "result": "authorised", "payload": { "txn": "T1" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "payment_confirmed");

    // The customer status page is keyed by secret id.
    let (status, body) = send(&test.app, get_request(&url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_ref"], order_ref);
    assert_eq!(body["status"], "payment_confirmed");
    assert_eq!(body["remaining_balance"], "0.00");

    // A frozen basket refuses further mutation.
    let (status, _) = send(
        &test.app,
        json_request("PUT", "/basket/billing-address", address_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_callback_with_unknown_result_is_rejected() {
    let test = setup();
    let body = checkout_flow(&test).await;
    let order_ref = body["order_ref"].as_str().unwrap();

    let (status, _) = send(
        &test.app,
        json_request(
            "POST",
            &format!("/gateway/callback/{order_ref}"),
            serde_json::json!({ "result": "maybe" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_status_not_found() {
    let test = setup();
    let (status, _) = send(&test.app, get_request("/order/not-a-real-secret")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_merchant_status_updates() {
    let test = setup();
    let body = checkout_flow(&test).await;
    let order_ref = body["order_ref"].as_str().unwrap().to_string();

    send(
        &test.app,
        json_request(
            "POST",
            &format!("/gateway/callback/{order_ref}"),
            serde_json::json!({ "result": "authorised" }),
        ),
    )
    .await;

    let (status, body) = send(
        &test.app,
        json_request(
            "POST",
            &format!("/orders/{order_ref}/status"),
            serde_json::json!({ "status": "processing" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    // Skipping straight to collected is illegal for a delivery order.
    let (status, _) = send(
        &test.app,
        json_request(
            "POST",
            &format!("/orders/{order_ref}/status"),
            serde_json::json!({ "status": "collected" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &test.app,
        json_request(
            "POST",
            &format!("/orders/{order_ref}/status"),
            serde_json::json!({ "status": "shipped" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");

    // Backend listing includes the order.
    let (status, body) = send(&test.app, get_request("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body.as_array()
            .unwrap()
            .iter()
            .any(|o| o["order_ref"] == order_ref.as_str())
    );
}
