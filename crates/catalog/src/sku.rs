//! Priced, stockable variant combinations.

use std::collections::BTreeSet;

use common::Money;
use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, SkuId, VarietyOptionId};

/// A priced stockable combination of variety options for one product.
///
/// Invariants, enforced by the store on write:
/// - the option combination is unique among a product's enabled SKUs
/// - every SKU of a product draws exactly one option from the same set of
///   varieties
/// - deleting a variety option deletes every SKU referencing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSku {
    pub id: SkuId,
    pub sku: String,
    pub barcode: Option<String>,
    pub product: ProductId,
    pub options: BTreeSet<VarietyOptionId>,
    /// Unit price; falls back to the product base price when absent.
    pub price: Option<Money>,
    pub stocklevel: i64,
    pub enabled: bool,
}

impl ProductSku {
    /// Creates an enabled SKU for the given option combination.
    pub fn new(
        sku: impl Into<String>,
        product: ProductId,
        options: impl IntoIterator<Item = VarietyOptionId>,
    ) -> Self {
        Self {
            id: SkuId::new(),
            sku: sku.into(),
            barcode: None,
            product,
            options: options.into_iter().collect(),
            price: None,
            stocklevel: 0,
            enabled: true,
        }
    }

    /// The unit price for this SKU, falling back to the product price.
    pub fn unit_price(&self, product_price: Money) -> Money {
        self.price.unwrap_or(product_price)
    }

    /// Returns true if this SKU matches the exact option selection.
    pub fn matches(&self, selection: &BTreeSet<VarietyOptionId>) -> bool {
        self.options == *selection
    }
}
