//! The pricing engine.
//!
//! Pure functions over a basket's cached state: every figure is
//! computable without touching the catalog, because lines cache their
//! unit price and exemption flags and the basket snapshots its voucher
//! and delivery option.

use catalog::{Discount, PriceOffset};
use common::{Country, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::basket::Basket;

/// The money figures for a basket or order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of rounded line totals.
    pub sub_total: Money,
    /// Sub-total after discount, before delivery; the tax basis.
    pub sub_total_before_delivery: Money,
    pub delivery: Money,
    pub discount: Money,
    pub total: Money,
    /// Delivery charge is settled out-of-band for this region.
    pub is_quote_only: bool,
}

impl Totals {
    /// The tax portion at the given percentage of the tax basis.
    pub fn tax_at(&self, percent: Decimal) -> Money {
        self.sub_total_before_delivery.percentage(percent)
    }
}

/// Resolves a unit price from a base price and variety offsets.
///
/// Used when no SKU supersedes the base price: each selected option
/// contributes its effective offset on top of the product price.
pub fn unit_price_with_offsets(
    base_price: Money,
    offsets: impl IntoIterator<Item = PriceOffset>,
) -> Money {
    offsets
        .into_iter()
        .fold(base_price, |price, offset| price + offset.amount(base_price))
        .round()
}

/// Prices a basket for the given delivery country.
pub fn price_basket(basket: &Basket, country: &Country) -> Totals {
    let sub_total = basket.sub_total();

    let (mut delivery, is_quote_only) = delivery_charge(basket, country);
    let mut discount = Money::zero();

    if let Some(voucher) = basket.voucher() {
        let eligible: Money = basket
            .items()
            .iter()
            .filter(|line| {
                !line.exempt_from_discount && voucher.allows_categories(&line.categories)
            })
            .map(|line| line.line_total())
            .sum();

        match voucher.discount {
            Discount::Percentage(percent) => {
                discount = eligible.percentage(percent).min(eligible);
            }
            Discount::FixedAmount(amount) => {
                discount = amount.min(eligible);
            }
            Discount::FreeDelivery => {
                delivery = Money::zero();
            }
        }
    }

    let sub_total_before_delivery = (sub_total - discount).clamp_non_negative();
    let total = (sub_total_before_delivery + delivery).clamp_non_negative().round();

    Totals {
        sub_total,
        sub_total_before_delivery,
        delivery,
        discount,
        total,
        is_quote_only,
    }
}

/// The delivery charge and quote-only flag for the basket.
fn delivery_charge(basket: &Basket, country: &Country) -> (Money, bool) {
    if basket.click_and_collect() {
        return (Money::zero(), false);
    }
    let Some(option) = basket.delivery_option() else {
        return (Money::zero(), false);
    };

    let terms = option.terms(country.region());
    if terms.quote_only {
        return (Money::zero(), true);
    }

    if option.free_delivery {
        // Lines exempt from free delivery do not count towards the
        // threshold.
        let qualifying: Money = basket
            .items()
            .iter()
            .filter(|line| !line.exempt_from_free_delivery)
            .map(|line| line.line_total())
            .sum();
        if qualifying >= option.free_delivery_threshold {
            return (Money::zero(), false);
        }
    }

    (terms.charge, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{BasketItem, LineId};
    use catalog::{CategoryId, DeliveryOption, ProductId, RegionTerms, Voucher};
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, BTreeSet};

    fn line(quantity: u32, unit_price: Money) -> BasketItem {
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

    fn uk_courier(charge: Money) -> DeliveryOption {
        let mut option = DeliveryOption::new("Courier");
        option.uk = RegionTerms::charged(charge);
        option
    }

    fn voucher(discount: Discount) -> Voucher {
        Voucher::new(
            "SAVE10",
            "Save",
            discount,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
        )
    }

    #[test]
    fn test_unit_price_with_value_and_percent_offsets() {
        let price = unit_price_with_offsets(
            Money::from_major(30),
            [
                PriceOffset::Value(Money::from_minor(250)),
                PriceOffset::Percent(Decimal::from(10)),
            ],
        );
        // 30.00 + 2.50 + 3.00
        assert_eq!(price, Money::from_minor(3550));
    }

    #[test]
    fn test_basic_percentage_voucher() {
        // 2 x 50.00, 10% voucher, UK delivery 5.00.
        let mut basket = Basket::new();
        basket.add_item(line(2, Money::from_major(50)), 99).unwrap();
        basket
            .set_delivery_option(uk_courier(Money::from_major(5)))
            .unwrap();
        basket
            .set_voucher(voucher(Discount::Percentage(Decimal::from(10))))
            .unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.sub_total, Money::from_major(100));
        assert_eq!(totals.discount, Money::from_major(10));
        assert_eq!(totals.delivery, Money::from_major(5));
        assert_eq!(totals.total, Money::from_major(95));
        assert_eq!(totals.sub_total_before_delivery, Money::from_major(90));
    }

    #[test]
    fn test_free_delivery_voucher_zeroes_delivery() {
        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(10)), 99).unwrap();
        basket
            .set_delivery_option(uk_courier(Money::from_major(5)))
            .unwrap();
        basket.set_voucher(voucher(Discount::FreeDelivery)).unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.delivery, Money::zero());
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.total, Money::from_major(10));
    }

    #[test]
    fn test_fixed_discount_caps_at_eligible_sub_total() {
        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(20)), 99).unwrap();
        basket
            .set_voucher(voucher(Discount::FixedAmount(Money::from_major(50))))
            .unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.discount, Money::from_major(20));
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_exempt_line_not_discounted() {
        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(40)), 99).unwrap();
        let mut exempt = line(1, Money::from_major(60));
        exempt.exempt_from_discount = true;
        basket.add_item(exempt, 99).unwrap();
        basket
            .set_voucher(voucher(Discount::Percentage(Decimal::from(10))))
            .unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.sub_total, Money::from_major(100));
        // 10% of the 40.00 eligible line only.
        assert_eq!(totals.discount, Money::from_major(4));
    }

    #[test]
    fn test_category_restricted_voucher_skips_other_lines() {
        let chairs = CategoryId::new();
        let mut v = voucher(Discount::Percentage(Decimal::from(50)));
        v.categories.insert(chairs);

        let mut in_category = line(1, Money::from_major(40));
        in_category.categories = vec![chairs];
        let outside = line(1, Money::from_major(60));

        let mut basket = Basket::new();
        basket.add_item(in_category, 99).unwrap();
        basket.add_item(outside, 99).unwrap();
        basket.set_voucher(v).unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.discount, Money::from_major(20));
    }

    #[test]
    fn test_free_delivery_threshold_met() {
        let mut option = uk_courier(Money::from_major(5));
        option.free_delivery = true;
        option.free_delivery_threshold = Money::from_major(50);

        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(60)), 99).unwrap();
        basket.set_delivery_option(option).unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.delivery, Money::zero());
    }

    #[test]
    fn test_exempt_lines_do_not_count_towards_threshold() {
        let mut option = uk_courier(Money::from_major(5));
        option.free_delivery = true;
        option.free_delivery_threshold = Money::from_major(50);

        let mut exempt = line(1, Money::from_major(60));
        exempt.exempt_from_free_delivery = true;
        let mut basket = Basket::new();
        basket.add_item(exempt, 99).unwrap();
        basket.add_item(line(1, Money::from_major(10)), 99).unwrap();
        basket.set_delivery_option(option).unwrap();

        // Qualifying sub-total is 10.00, below the threshold.
        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.delivery, Money::from_major(5));
    }

    #[test]
    fn test_quote_only_region() {
        let mut option = uk_courier(Money::from_major(5));
        option.world = RegionTerms::quote_only();

        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(10)), 99).unwrap();
        basket.set_delivery_option(option).unwrap();

        let totals = price_basket(&basket, &Country::new("AU"));
        assert_eq!(totals.delivery, Money::zero());
        assert!(totals.is_quote_only);
    }

    #[test]
    fn test_click_and_collect_is_free() {
        let mut basket = Basket::new();
        basket.add_item(line(1, Money::from_major(10)), 99).unwrap();
        basket.set_click_and_collect(true).unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.delivery, Money::zero());
        assert!(!totals.is_quote_only);
    }

    #[test]
    fn test_rounding_half_up_per_line() {
        // 3 x 3.333 rounds the line to 10.00, not 9.99.
        let mut basket = Basket::new();
        basket
            .add_item(line(3, Money::new(Decimal::new(3333, 3))), 99)
            .unwrap();

        let totals = price_basket(&basket, &Country::new("GB"));
        assert_eq!(totals.sub_total, Money::from_major(10));
    }

    #[test]
    fn test_tax_at() {
        let totals = Totals {
            sub_total_before_delivery: Money::from_major(90),
            ..Totals::default()
        };
        assert_eq!(totals.tax_at(Decimal::from(20)), Money::from_major(18));
    }
}
