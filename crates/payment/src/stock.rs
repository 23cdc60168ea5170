//! Stock adjustment for confirmed orders.

use std::sync::Arc;

use basket::BasketSnapshot;
use catalog::{CatalogStore, ProductId, SkuId, StockPolicy};
use orders::Order;

use crate::error::Result;

/// A confirmed sale asked for more stock than was on hand.
///
/// Stock never goes below zero; the order still transitions (the sale is
/// already priced) and the caller decides how to handle the shortfall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversellAttempt {
    pub order_ref: String,
    pub product: ProductId,
    pub sku: Option<SkuId>,
    pub requested: i64,
    pub applied: i64,
}

/// Decrements stock when an order is confirmed.
///
/// Only products with the auto stock policy are counted down; lines that
/// resolved a SKU decrement the SKU's stock instead of the product's.
pub struct StockAdjuster<C> {
    catalog: Arc<C>,
}

impl<C: CatalogStore> StockAdjuster<C> {
    /// Creates a new stock adjuster.
    pub fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    /// Applies the order's lines to stock, returning any oversells.
    #[tracing::instrument(skip(self, order), fields(order_ref = %order.order_ref))]
    pub async fn apply(&self, order: &Order) -> Result<Vec<OversellAttempt>> {
        let snapshot: BasketSnapshot = serde_json::from_value(order.basket_json.clone())?;
        let mut oversells = Vec::new();

        for line in &snapshot.lines {
            // The product may have been deleted since the basket was
            // built; nothing to count down then.
            let Some(product) = self.catalog.product(line.product_id).await? else {
                continue;
            };
            if product.stock_policy != StockPolicy::Auto {
                continue;
            }

            let decrement = match line.sku_id {
                Some(sku_id) => self.catalog.decrement_sku_stock(sku_id, line.quantity).await?,
                None => {
                    self.catalog
                        .decrement_product_stock(line.product_id, line.quantity)
                        .await?
                }
            };

            if decrement.oversold() {
                tracing::warn!(
                    product = %line.product_id,
                    requested = decrement.requested,
                    applied = decrement.applied,
                    "oversell on confirmed order"
                );
                metrics::counter!("shop_oversell_attempts_total").increment(1);
                oversells.push(OversellAttempt {
                    order_ref: order.order_ref.clone(),
                    product: line.product_id,
                    sku: line.sku_id,
                    requested: decrement.requested,
                    applied: decrement.applied,
                });
            }
        }

        Ok(oversells)
    }
}
