//! Varieties, variety options and per-product assignments.

use common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, VarietyId, VarietyOptionId};

/// How a variety is presented on the product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarietyStyle {
    #[default]
    Select,
    List,
    ListWithImage,
    /// Filtering only; never presented as a purchase choice.
    Attribute,
}

/// A choice dimension, e.g. "Colour".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variety {
    pub id: VarietyId,
    pub title: String,
    pub display_title: String,
    pub slug: String,
    pub style: VarietyStyle,
    /// When set, this variety contributes to SKU resolution.
    pub sku: bool,
    pub enabled: bool,
    pub parent: Option<VarietyId>,
    pub seq: i32,
}

impl Variety {
    /// Creates an enabled select-style variety.
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: VarietyId::new(),
            display_title: title.clone(),
            title,
            slug: slug.into(),
            style: VarietyStyle::Select,
            sku: false,
            enabled: true,
            parent: None,
            seq: 0,
        }
    }

    /// Returns true if the customer must pick an option from this variety
    /// when buying an assigned product.
    pub fn is_purchase_choice(&self) -> bool {
        self.enabled && self.style != VarietyStyle::Attribute
    }
}

/// A price modifier attached to a variety option or assignment.
///
/// The modifier is an amount added to the product base price; percent
/// offsets are relative to that base price.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PriceOffset {
    #[default]
    None,
    Value(Money),
    Percent(Decimal),
}

impl PriceOffset {
    /// Returns the amount this offset adds on top of `base_price`.
    pub fn amount(&self, base_price: Money) -> Money {
        match self {
            PriceOffset::None => Money::zero(),
            PriceOffset::Value(value) => *value,
            PriceOffset::Percent(percent) => base_price.percentage(*percent),
        }
    }
}

/// A value within a variety, e.g. "Red".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarietyOption {
    pub id: VarietyOptionId,
    pub variety: VarietyId,
    pub title: String,
    pub enabled: bool,
    /// Offset applied unless a product assignment overrides it.
    pub default_offset: PriceOffset,
    pub image: Option<String>,
    pub colour: Option<String>,
    /// Allows customer-typed text against this option.
    pub text_label: bool,
    pub seq: i32,
}

impl VarietyOption {
    /// Creates an enabled option with no offset.
    pub fn new(variety: VarietyId, title: impl Into<String>) -> Self {
        Self {
            id: VarietyOptionId::new(),
            variety,
            title: title.into(),
            enabled: true,
            default_offset: PriceOffset::None,
            image: None,
            colour: None,
            text_label: false,
            seq: 0,
        }
    }
}

/// Binds a product to a variety option, optionally overriding the
/// option's default price offset. Unique on (product, option).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarietyAssignment {
    pub product: ProductId,
    pub option: VarietyOptionId,
    pub offset_override: Option<PriceOffset>,
}

impl VarietyAssignment {
    /// Creates an assignment using the option's default offset.
    pub fn new(product: ProductId, option: VarietyOptionId) -> Self {
        Self {
            product,
            option,
            offset_override: None,
        }
    }

    /// Creates an assignment with a per-product offset override.
    pub fn with_override(product: ProductId, option: VarietyOptionId, offset: PriceOffset) -> Self {
        Self {
            product,
            option,
            offset_override: Some(offset),
        }
    }
}
