//! Basket line items.

use std::collections::{BTreeMap, BTreeSet};

use catalog::{CategoryId, ProductId, SkuId, VarietyOptionId};
use common::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a basket line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    /// Creates a new random line identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line in a basket.
///
/// The product reference is weak: alongside it the line caches every
/// product fact pricing and eligibility need, so the line keeps working
/// (frozen at its cached price) if the product is edited or deleted
/// after adding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    /// Unit price at the time of addition.
    pub unit_price: Money,
    pub sku_id: Option<SkuId>,
    #[serde(default)]
    pub sku_code: Option<String>,
    pub variety_option_ids: BTreeSet<VarietyOptionId>,
    /// Customer-typed text per option, for text-label options.
    #[serde(default)]
    pub labels: BTreeMap<VarietyOptionId, String>,
    /// Free-text attributes attached by the caller.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    /// Cached product facts.
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub collection_only: bool,
    #[serde(default)]
    pub exempt_from_free_delivery: bool,
    #[serde(default)]
    pub exempt_from_discount: bool,
}

impl BasketItem {
    /// The rounded line total.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity).round()
    }

    /// Two lines merge iff they are the same product with the same
    /// variety selections, the same text labels and the same custom
    /// attributes.
    pub fn merges_with(&self, other: &BasketItem) -> bool {
        self.product_id == other.product_id
            && self.variety_option_ids == other.variety_option_ids
            && self.labels == other.labels
            && self.custom == other.custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn item(quantity: u32, unit_price: Money) -> BasketItem {
        BasketItem {
            id: LineId::new(),
            product_id: ProductId::new(),
            title: "Widget".to_string(),
            quantity,
            unit_price,
            sku_id: None,
            sku_code: None,
            variety_option_ids: BTreeSet::new(),
            labels: BTreeMap::new(),
            custom: BTreeMap::new(),
            categories: Vec::new(),
            collection_only: false,
            exempt_from_free_delivery: false,
            exempt_from_discount: false,
        }
    }

    #[test]
    fn test_line_total_rounds() {
        let line = item(3, Money::new(rust_decimal::Decimal::new(3333, 3))); // 3.333
        assert_eq!(line.line_total(), Money::from_minor(1000)); // 9.999 -> 10.00
    }

    #[test]
    fn test_merges_with_same_identity() {
        let a = item(1, Money::from_major(10));
        let mut b = a.clone();
        b.id = LineId::new();
        b.quantity = 4;
        assert!(a.merges_with(&b));
    }

    #[test]
    fn test_no_merge_on_different_product() {
        let a = item(1, Money::from_major(10));
        let mut b = a.clone();
        b.product_id = ProductId::new();
        assert!(!a.merges_with(&b));
    }

    #[test]
    fn test_no_merge_on_different_options() {
        let a = item(1, Money::from_major(10));
        let mut b = a.clone();
        b.variety_option_ids.insert(VarietyOptionId::new());
        assert!(!a.merges_with(&b));
    }

    #[test]
    fn test_no_merge_on_different_labels() {
        let a = item(1, Money::from_major(10));
        let mut b = a.clone();
        b.labels.insert(VarietyOptionId::new(), "engraved".to_string());
        assert!(!a.merges_with(&b));
    }

    #[test]
    fn test_no_merge_on_different_custom() {
        let a = item(1, Money::from_major(10));
        let mut b = a.clone();
        b.custom.insert("gift-wrap".to_string(), "yes".to_string());
        assert!(!a.merges_with(&b));
    }
}
