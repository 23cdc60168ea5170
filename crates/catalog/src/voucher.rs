//! Discount vouchers.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use common::{Country, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, VoucherId};

/// The discount a voucher grants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage off the eligible sub-total.
    Percentage(Decimal),
    /// Fixed amount off, capped at the eligible sub-total.
    FixedAmount(Money),
    /// Delivery charge waived; no sub-total discount.
    FreeDelivery,
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    /// Uppercase, no spaces, unique.
    pub code: String,
    pub title: String,
    pub enabled: bool,
    /// Validity window, both ends inclusive; `valid_from <= valid_until`.
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    /// None means unlimited.
    pub max_usage: Option<u64>,
    pub discount: Discount,
    /// When non-empty, only lines in these categories are discounted and
    /// the voucher requires at least one such line.
    pub categories: BTreeSet<CategoryId>,
    /// When non-empty, the delivery country must be one of these.
    pub countries: HashSet<Country>,
}

impl Voucher {
    /// Creates an enabled voucher with the given code and window.
    ///
    /// The code is normalised (uppercased, spaces stripped).
    pub fn new(
        code: impl AsRef<str>,
        title: impl Into<String>,
        discount: Discount,
        valid_from: NaiveDate,
        valid_until: NaiveDate,
    ) -> Self {
        Self {
            id: VoucherId::new(),
            code: Self::normalise_code(code),
            title: title.into(),
            enabled: true,
            valid_from,
            valid_until,
            max_usage: None,
            discount,
            categories: BTreeSet::new(),
            countries: HashSet::new(),
        }
    }

    /// Uppercases and strips whitespace so lookups are case-insensitive.
    pub fn normalise_code(code: impl AsRef<str>) -> String {
        code.as_ref()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    }

    /// Returns true if `date` falls inside the validity window.
    pub fn in_window(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_until
    }

    /// Returns true if the usage count has reached the cap.
    pub fn exhausted(&self, usage: u64) -> bool {
        matches!(self.max_usage, Some(max) if usage >= max)
    }

    /// Returns true if the voucher may be used in the delivery country.
    pub fn allows_country(&self, country: &Country) -> bool {
        self.countries.is_empty() || self.countries.contains(country)
    }

    /// Returns true if a product in the given categories is eligible for
    /// this voucher's discount.
    pub fn allows_categories(&self, product_categories: &[CategoryId]) -> bool {
        self.categories.is_empty()
            || product_categories.iter().any(|c| self.categories.contains(c))
    }
}
