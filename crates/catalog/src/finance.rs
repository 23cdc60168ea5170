//! Finance (credit) options.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::ids::FinanceOptionId;

/// A titled credit product offered at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceOption {
    pub id: FinanceOptionId,
    pub title: String,
    pub code: String,
    /// Basket totals below this cannot take the option.
    pub min_basket_value: Money,
    pub enabled: bool,
    /// When set, every line's product must list this option.
    pub per_product: bool,
}

impl FinanceOption {
    /// Creates an enabled finance option.
    pub fn new(title: impl Into<String>, code: impl Into<String>, min_basket_value: Money) -> Self {
        Self {
            id: FinanceOptionId::new(),
            title: title.into(),
            code: code.into(),
            min_basket_value,
            enabled: true,
            per_product: false,
        }
    }
}
