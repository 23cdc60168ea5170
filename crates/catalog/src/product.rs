//! Products and stock policies.

use std::collections::BTreeSet;

use common::Money;
use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, DeliveryOptionId, FinanceOptionId, ProductId};

/// How stock is tracked and advertised for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Sold regardless of the stock count.
    #[default]
    Available,

    /// Not currently sold.
    OutOfStock,

    /// Stock counted down automatically on confirmed orders.
    Auto,

    /// Manufactured on demand; no stock count applies.
    MadeToOrder,
}

impl StockPolicy {
    /// Returns the policy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPolicy::Available => "available",
            StockPolicy::OutOfStock => "out_of_stock",
            StockPolicy::Auto => "auto",
            StockPolicy::MadeToOrder => "made_to_order",
        }
    }
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A catalog item.
///
/// Basket lines hold weak references to products: the product may be
/// deleted or edited after a line is added, so the line caches the facts
/// it priced against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// Globally unique URL slug.
    pub slug: String,
    /// Primary category.
    pub category: CategoryId,
    pub additional_categories: BTreeSet<CategoryId>,
    /// Base price; superseded by SKU prices for priced-variant purchases.
    pub price: Money,
    pub rrp: Option<Money>,
    pub previous_price: Option<Money>,
    pub stock_policy: StockPolicy,
    pub stocklevel: i64,
    /// When set, per-SKU records supersede base price and stock.
    pub sku_enabled: bool,
    /// Global SKU string for products without per-variant SKUs.
    pub sku: Option<String>,
    pub barcode_system: Option<String>,
    pub barcode: Option<String>,
    pub pre_order: bool,
    pub deposit: Option<Money>,
    pub draft: bool,
    /// Only collectable in store; forces click-and-collect.
    pub collection_only: bool,
    pub exempt_from_free_delivery: bool,
    pub exempt_from_discount: bool,
    pub finance_options: BTreeSet<FinanceOptionId>,
    pub delivery_options: BTreeSet<DeliveryOptionId>,
    pub related_products: Vec<ProductId>,
    /// Optimistic-concurrency counter, bumped on every save.
    pub version: u64,
}

impl Product {
    /// Creates a product with the given essentials and default flags.
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        category: CategoryId,
        price: Money,
    ) -> Self {
        Self {
            id: ProductId::new(),
            title: title.into(),
            slug: slug.into(),
            category,
            additional_categories: BTreeSet::new(),
            price,
            rrp: None,
            previous_price: None,
            stock_policy: StockPolicy::Available,
            stocklevel: 0,
            sku_enabled: false,
            sku: None,
            barcode_system: None,
            barcode: None,
            pre_order: false,
            deposit: None,
            draft: false,
            collection_only: false,
            exempt_from_free_delivery: false,
            exempt_from_discount: false,
            finance_options: BTreeSet::new(),
            delivery_options: BTreeSet::new(),
            related_products: Vec::new(),
            version: 0,
        }
    }

    /// All categories the product belongs to, primary first.
    pub fn all_categories(&self) -> Vec<CategoryId> {
        let mut categories = vec![self.category];
        categories.extend(self.additional_categories.iter().copied());
        categories
    }

    /// Returns true if there is counted stock on hand.
    pub fn has_stock(&self) -> bool {
        self.stocklevel > 0
    }

    /// Returns true if the product can currently be added to a basket.
    ///
    /// Draft products never sell. Auto-stock products need stock on hand
    /// unless they are open for pre-order.
    pub fn is_addable(&self) -> bool {
        if self.draft {
            return false;
        }
        match self.stock_policy {
            StockPolicy::Available | StockPolicy::MadeToOrder => true,
            StockPolicy::OutOfStock => false,
            StockPolicy::Auto => self.has_stock() || self.pre_order,
        }
    }
}
