//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and run serially.

use std::sync::Arc;

use catalog::{
    CatalogError, CatalogStore, Category, Product, ProductSku, Variety, VarietyOption,
};
use common::Money;
use orders::{Order, OrderError, OrderStatus, OrderStore};
use postgres_store::{PostgresCatalogStore, PostgresOrderStore, run_migrations};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            run_migrations(&pool).await.unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh stores over cleared tables for test isolation.
async fn get_stores() -> (PostgresCatalogStore, PostgresOrderStore) {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE products, categories, varieties, variety_options,
         variety_assignments, skus, delivery_options, vouchers, finance_options, orders",
    )
    .execute(&pool)
    .await
    .unwrap();

    (
        PostgresCatalogStore::new(pool.clone()),
        PostgresOrderStore::new(pool),
    )
}

async fn seeded_product(catalog: &PostgresCatalogStore) -> Product {
    let category = catalog
        .save_category(Category::new("Chairs", "chairs"))
        .await
        .unwrap();
    catalog
        .save_product(Product::new(
            "Widget",
            "widget",
            category.id,
            Money::from_major(30),
        ))
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_product_roundtrip_and_slug_lookup() {
    let (catalog, _) = get_stores().await;
    let product = seeded_product(&catalog).await;

    let loaded = catalog.product(product.id).await.unwrap().unwrap();
    assert_eq!(loaded, product);
    let by_slug = catalog.product_by_slug("widget").await.unwrap().unwrap();
    assert_eq!(by_slug.id, product.id);
}

#[tokio::test]
#[serial]
async fn test_duplicate_slug_rejected() {
    let (catalog, _) = get_stores().await;
    let product = seeded_product(&catalog).await;

    let clash = Product::new("Other", "widget", product.category, Money::from_major(5));
    assert!(matches!(
        catalog.save_product(clash).await,
        Err(CatalogError::DuplicateSlug { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_stale_product_save_conflicts() {
    let (catalog, _) = get_stores().await;
    let product = seeded_product(&catalog).await;

    let mut stale = product.clone();
    stale.version = 0;
    assert!(matches!(
        catalog.save_product(stale).await,
        Err(CatalogError::VersionConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_category_cycle_rejected() {
    let (catalog, _) = get_stores().await;
    let a = catalog.save_category(Category::new("A", "a")).await.unwrap();
    let mut b = Category::new("B", "b");
    b.parent = Some(a.id);
    let b = catalog.save_category(b).await.unwrap();

    let mut a_updated = a.clone();
    a_updated.parent = Some(b.id);
    assert!(matches!(
        catalog.save_category(a_updated).await,
        Err(CatalogError::CategoryCycle)
    ));

    let path = catalog.category_path(b.id).await.unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path[0].id, a.id);
}

#[tokio::test]
#[serial]
async fn test_sku_lookup_and_option_cascade() {
    let (catalog, _) = get_stores().await;
    let product = seeded_product(&catalog).await;

    let colour = Variety::new("Colour", "colour");
    catalog.save_variety(colour.clone()).await.unwrap();
    let red = VarietyOption::new(colour.id, "Red");
    catalog.save_variety_option(red.clone()).await.unwrap();

    let mut sku = ProductSku::new("W-RED", product.id, [red.id]);
    sku.stocklevel = 5;
    catalog.save_sku(sku.clone()).await.unwrap();

    let found = catalog
        .find_sku(product.id, &std::collections::BTreeSet::from([red.id]))
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id), Some(sku.id));

    catalog.delete_variety_option(red.id).await.unwrap();
    assert!(catalog.sku(sku.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_stock_decrement_floors_at_zero() {
    let (catalog, _) = get_stores().await;
    let mut product = seeded_product(&catalog).await;
    product.stocklevel = 3;
    let product = catalog.save_product(product).await.unwrap();

    let decrement = catalog.decrement_product_stock(product.id, 5).await.unwrap();
    assert_eq!(decrement.applied, 3);
    assert_eq!(decrement.remaining, 0);
    assert!(decrement.oversold());

    let stored = catalog.product(product.id).await.unwrap().unwrap();
    assert_eq!(stored.stocklevel, 0);
}

#[tokio::test]
#[serial]
async fn test_order_roundtrip_and_secret_lookup() {
    let (_, orders) = get_stores().await;
    let order = Order::create_empty_customer_not_present("PG-1".to_string());
    let stored = orders.insert(order).await.unwrap();

    let by_id = orders.get(stored.id).await.unwrap().unwrap();
    assert_eq!(by_id, stored);
    let by_secret = orders.get_by_secret(&stored.secret_id).await.unwrap().unwrap();
    assert_eq!(by_secret.id, stored.id);
    let by_ref = orders.get_by_ref("PG-1").await.unwrap().unwrap();
    assert_eq!(by_ref.id, stored.id);
}

#[tokio::test]
#[serial]
async fn test_concurrent_update_conflicts() {
    let (_, orders) = get_stores().await;
    let stored = orders
        .insert(Order::create_empty_customer_not_present("PG-2".to_string()))
        .await
        .unwrap();

    let winner = orders.update(stored.clone()).await.unwrap();
    assert_eq!(winner.version, 2);

    assert!(matches!(
        orders.update(stored).await,
        Err(OrderError::Conflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_sequence_and_voucher_usage() {
    let (_, orders) = get_stores().await;

    let first = orders.next_sequence().await.unwrap();
    let second = orders.next_sequence().await.unwrap();
    assert!(second > first);

    let mut used = Order::create_empty_customer_not_present("PG-3".to_string());
    used.voucher_code = Some("SAVE10".to_string());
    used.status = OrderStatus::PaymentConfirmed;
    orders.insert(used).await.unwrap();

    let mut pending = Order::create_empty_customer_not_present("PG-4".to_string());
    pending.voucher_code = Some("SAVE10".to_string());
    pending.status = OrderStatus::PaymentAwaiting;
    orders.insert(pending).await.unwrap();

    assert_eq!(orders.count_voucher_uses("SAVE10").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_approvals_waiting_before() {
    let (_, orders) = get_stores().await;

    let mut stale = Order::create_empty_customer_not_present("PG-5".to_string());
    stale.approval_status = orders::ApprovalStatus::Waiting;
    stale.approval_requested_at = Some(chrono::Utc::now() - chrono::Duration::hours(100));
    let stale = orders.insert(stale).await.unwrap();

    let mut fresh = Order::create_empty_customer_not_present("PG-6".to_string());
    fresh.approval_status = orders::ApprovalStatus::Waiting;
    fresh.approval_requested_at = Some(chrono::Utc::now());
    orders.insert(fresh).await.unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::hours(72);
    let found = orders.approvals_waiting_before(cutoff).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, stale.id);
}
