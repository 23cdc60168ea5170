//! Catalog model for the shop core.
//!
//! This crate provides the merchandising data model and its query surface:
//! - Products with stock policies and per-product exemptions
//! - Hierarchical categories (acyclic, enforced on write)
//! - Varieties, variety options and per-product assignments with price
//!   offsets
//! - Priced, stockable SKUs resolved from option combinations
//! - Delivery options with per-region terms
//! - Vouchers and finance options
//! - The listing-order resolver for category pages

pub mod category;
pub mod delivery;
pub mod error;
pub mod finance;
pub mod ids;
pub mod listing;
pub mod memory;
pub mod product;
pub mod sku;
pub mod store;
pub mod variety;
pub mod voucher;

pub use category::{Category, MAX_ANCESTOR_DEPTH, ProductOrdering};
pub use delivery::{DeliveryOption, RegionTerms};
pub use error::CatalogError;
pub use finance::FinanceOption;
pub use ids::{
    CategoryId, DeliveryOptionId, FinanceOptionId, ProductId, SkuId, VarietyId, VarietyOptionId,
    VoucherId,
};
pub use listing::resolve_listing_order;
pub use memory::InMemoryCatalog;
pub use product::{Product, StockPolicy};
pub use sku::ProductSku;
pub use store::{AssignedOption, CatalogStore, StockDecrement, VoucherUsage};
pub use variety::{PriceOffset, Variety, VarietyAssignment, VarietyOption, VarietyStyle};
pub use voucher::{Discount, Voucher};
