//! PostgreSQL-backed stores for the shop core.
//!
//! Entities persist as JSONB documents next to the columns queries
//! filter and lock on. Order writes take a row-level lock
//! (`SELECT ... FOR UPDATE`) inside a transaction, serialising state
//! transitions per order; catalog writes use the same optimistic version
//! check the in-memory store applies.

pub mod catalog_store;
pub mod order_store;

pub use catalog_store::PostgresCatalogStore;
pub use order_store::PostgresOrderStore;

/// Runs the schema migration against a pool.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../../../migrations/001_create_shop_tables.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
