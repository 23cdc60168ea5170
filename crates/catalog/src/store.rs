//! Catalog storage trait and supporting query types.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::category::Category;
use crate::delivery::DeliveryOption;
use crate::error::Result;
use crate::finance::FinanceOption;
use crate::ids::{
    CategoryId, DeliveryOptionId, FinanceOptionId, ProductId, SkuId, VarietyOptionId,
};
use crate::product::Product;
use crate::sku::ProductSku;
use crate::variety::{PriceOffset, Variety, VarietyAssignment, VarietyOption};
use crate::voucher::Voucher;

/// A variety option assigned to a product, joined with its variety and
/// any per-product offset override.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedOption {
    pub variety: Variety,
    pub option: VarietyOption,
    pub offset_override: Option<PriceOffset>,
}

impl AssignedOption {
    /// The offset in force for this product: the assignment override when
    /// present, the option default otherwise.
    pub fn effective_offset(&self) -> PriceOffset {
        self.offset_override.unwrap_or(self.option.default_offset)
    }
}

/// Outcome of a stock decrement.
///
/// Stock never goes below zero; `applied` records how much of the
/// requested decrement actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    pub requested: i64,
    pub applied: i64,
    pub remaining: i64,
}

impl StockDecrement {
    /// Returns true if stock ran out before the full quantity was
    /// decremented.
    pub fn oversold(&self) -> bool {
        self.applied < self.requested
    }
}

/// Counts successful orders referencing a voucher code.
///
/// Implemented by the order store; the basket consults it when a voucher
/// is applied or re-validated.
#[async_trait]
pub trait VoucherUsage: Send + Sync {
    /// Number of successful orders that used the voucher code.
    async fn successful_uses(&self, code: &str) -> Result<u64>;
}

/// Storage for the catalog.
///
/// The catalog is read-heavy and write-rare; writes use optimistic
/// concurrency (version check-and-save), and the write methods enforce
/// the model invariants (unique slugs, acyclic categories, SKU
/// combination rules, option-deletion cascade).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // -- Products --

    /// Looks up a product by id.
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Looks up a product by slug.
    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>>;

    /// Saves a product, enforcing slug uniqueness and the version check.
    /// Returns the stored product with its version bumped.
    async fn save_product(&self, product: Product) -> Result<Product>;

    // -- Varieties --

    /// The enabled options assigned to a product, joined with their
    /// varieties.
    async fn assigned_options(&self, product: ProductId) -> Result<Vec<AssignedOption>>;

    async fn save_variety(&self, variety: Variety) -> Result<()>;

    async fn save_variety_option(&self, option: VarietyOption) -> Result<()>;

    /// Deletes an option, cascading to its assignments and to every SKU
    /// referencing it.
    async fn delete_variety_option(&self, id: VarietyOptionId) -> Result<()>;

    /// Saves an assignment; unique on (product, option).
    async fn save_assignment(&self, assignment: VarietyAssignment) -> Result<()>;

    // -- SKUs --

    async fn sku(&self, id: SkuId) -> Result<Option<ProductSku>>;

    /// Finds the enabled SKU matching the exact option selection.
    async fn find_sku(
        &self,
        product: ProductId,
        options: &BTreeSet<VarietyOptionId>,
    ) -> Result<Option<ProductSku>>;

    /// Saves a SKU, enforcing the combination and variety-set invariants.
    async fn save_sku(&self, sku: ProductSku) -> Result<()>;

    // -- Stock --

    /// Atomically decrements product stock, flooring at zero.
    async fn decrement_product_stock(&self, id: ProductId, quantity: u32)
    -> Result<StockDecrement>;

    /// Atomically decrements SKU stock, flooring at zero.
    async fn decrement_sku_stock(&self, id: SkuId, quantity: u32) -> Result<StockDecrement>;

    // -- Delivery --

    async fn delivery_option(&self, id: DeliveryOptionId) -> Result<Option<DeliveryOption>>;

    /// Enabled delivery options ordered by seq.
    async fn delivery_options(&self) -> Result<Vec<DeliveryOption>>;

    async fn save_delivery_option(&self, option: DeliveryOption) -> Result<()>;

    // -- Vouchers --

    /// Resolves a voucher by code, case-insensitively.
    async fn voucher_by_code(&self, code: &str) -> Result<Option<Voucher>>;

    async fn save_voucher(&self, voucher: Voucher) -> Result<()>;

    // -- Finance --

    async fn finance_option(&self, id: FinanceOptionId) -> Result<Option<FinanceOption>>;

    async fn save_finance_option(&self, option: FinanceOption) -> Result<()>;

    // -- Categories --

    async fn category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// All categories ordered by seq.
    async fn categories(&self) -> Result<Vec<Category>>;

    /// The hierarchical path from root to the category, inclusive.
    async fn category_path(&self, id: CategoryId) -> Result<Vec<Category>>;

    /// Saves a category, enforcing slug uniqueness, the version check and
    /// hierarchy acyclicity.
    async fn save_category(&self, category: Category) -> Result<Category>;
}
