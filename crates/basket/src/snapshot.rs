//! Versioned basket serialisation.
//!
//! Snapshots back both the session store and `Order.basket_json`. The
//! layout is explicit and versioned (v2): unknown keys are ignored and
//! optional keys may be absent, so older snapshots and foreign writers
//! keep loading.

use std::collections::BTreeMap;

use catalog::{
    CategoryId, DeliveryOption, DeliveryOptionId, FinanceOptionId, ProductId, SkuId,
    VarietyOptionId, Voucher,
};
use common::Money;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::basket::{Basket, FinanceSelection};
use crate::item::{BasketItem, LineId};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 2;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// One serialised basket line.
///
/// The id and cached product facts are carried so a restore reproduces
/// the basket exactly; readers of older snapshots fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    #[serde(default)]
    pub id: LineId,
    pub product_id: ProductId,
    #[serde(default)]
    pub sku_id: Option<SkuId>,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(default)]
    pub variety_option_ids: Vec<VarietyOptionId>,
    #[serde(default)]
    pub labels: BTreeMap<VarietyOptionId, String>,
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sku_code: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub collection_only: bool,
    #[serde(default)]
    pub exempt_from_free_delivery: bool,
    #[serde(default)]
    pub exempt_from_discount: bool,
}

impl From<&BasketItem> for LineSnapshot {
    fn from(item: &BasketItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            sku_id: item.sku_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            variety_option_ids: item.variety_option_ids.iter().copied().collect(),
            labels: item.labels.clone(),
            custom: item.custom.clone(),
            title: item.title.clone(),
            sku_code: item.sku_code.clone(),
            categories: item.categories.clone(),
            collection_only: item.collection_only,
            exempt_from_free_delivery: item.exempt_from_free_delivery,
            exempt_from_discount: item.exempt_from_discount,
        }
    }
}

impl From<LineSnapshot> for BasketItem {
    fn from(snapshot: LineSnapshot) -> Self {
        Self {
            id: snapshot.id,
            product_id: snapshot.product_id,
            title: snapshot.title,
            quantity: snapshot.quantity,
            unit_price: snapshot.unit_price,
            sku_id: snapshot.sku_id,
            sku_code: snapshot.sku_code,
            variety_option_ids: snapshot.variety_option_ids.into_iter().collect(),
            labels: snapshot.labels,
            custom: snapshot.custom,
            categories: snapshot.categories,
            collection_only: snapshot.collection_only,
            exempt_from_free_delivery: snapshot.exempt_from_free_delivery,
            exempt_from_discount: snapshot.exempt_from_discount,
        }
    }
}

/// The serialised basket, layout v2.
///
/// `voucher_code`, `delivery_option_id` and `finance_option_id` are the
/// interchange keys; the full `voucher` / `delivery_option` snapshots
/// ride alongside so a restore needs no catalog access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub lines: Vec<LineSnapshot>,
    #[serde(default)]
    pub billing: Option<Address>,
    #[serde(default)]
    pub delivery: Option<Address>,
    #[serde(default)]
    pub delivery_option_id: Option<DeliveryOptionId>,
    #[serde(default)]
    pub delivery_option: Option<DeliveryOption>,
    #[serde(default)]
    pub click_and_collect: bool,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub voucher: Option<Voucher>,
    #[serde(default)]
    pub finance_option_id: Option<FinanceOptionId>,
    #[serde(default)]
    pub finance: Option<FinanceSelection>,
    #[serde(default)]
    pub loan_deposit: Option<rust_decimal::Decimal>,
    #[serde(default)]
    pub free_delivery_code: Option<String>,
    #[serde(default)]
    pub survey: Option<String>,
    #[serde(default)]
    pub invoice: bool,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub frozen: bool,
}

impl Basket {
    /// Serialises the basket for session storage or `Order.basket_json`.
    pub fn to_snapshot(&self) -> BasketSnapshot {
        BasketSnapshot {
            version: SNAPSHOT_VERSION,
            lines: self.items.iter().map(LineSnapshot::from).collect(),
            billing: self.billing_address.clone(),
            delivery: self.delivery_address.clone(),
            delivery_option_id: self.delivery_option.as_ref().map(|o| o.id),
            delivery_option: self.delivery_option.clone(),
            click_and_collect: self.click_and_collect,
            voucher_code: self.voucher.as_ref().map(|v| v.code.clone()),
            voucher: self.voucher.clone(),
            finance_option_id: self.finance.as_ref().map(|f| f.option.id),
            finance: self.finance.clone(),
            loan_deposit: self.finance.as_ref().map(|f| f.deposit_percent),
            free_delivery_code: self.free_delivery_code.clone(),
            survey: self.survey_answer.clone(),
            invoice: self.invoice,
            special_requirements: self.special_requirements.clone(),
            frozen: self.frozen,
        }
    }

    /// Restores a basket from a snapshot.
    pub fn from_snapshot(snapshot: BasketSnapshot) -> Self {
        Self {
            items: snapshot.lines.into_iter().map(BasketItem::from).collect(),
            billing_address: snapshot.billing,
            delivery_address: snapshot.delivery,
            delivery_option: snapshot.delivery_option,
            click_and_collect: snapshot.click_and_collect,
            voucher: snapshot.voucher,
            finance: snapshot.finance,
            free_delivery_code: snapshot.free_delivery_code,
            survey_answer: snapshot.survey,
            special_requirements: snapshot.special_requirements,
            invoice: snapshot.invoice,
            frozen: snapshot.frozen,
        }
    }

    /// Serialises to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_snapshot()).expect("basket snapshot serialises")
    }

    /// Restores from a JSON value, tolerating unknown and missing keys.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self::from_snapshot(serde_json::from_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Discount, RegionTerms};
    use chrono::NaiveDate;
    use common::Country;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn populated_basket() -> Basket {
        let mut basket = Basket::new();
        let option_id = VarietyOptionId::new();
        basket
            .add_item(
                BasketItem {
                    id: LineId::new(),
                    product_id: ProductId::new(),
                    title: "Widget".to_string(),
                    quantity: 2,
                    unit_price: Money::from_minor(4999),
                    sku_id: Some(SkuId::new()),
                    sku_code: Some("W-RED-L".to_string()),
                    variety_option_ids: BTreeSet::from([option_id]),
                    labels: BTreeMap::from([(option_id, "engraved".to_string())]),
                    custom: BTreeMap::from([("gift".to_string(), "yes".to_string())]),
                    categories: vec![CategoryId::new()],
                    collection_only: false,
                    exempt_from_free_delivery: false,
                    exempt_from_discount: false,
                },
                99,
            )
            .unwrap();
        basket
            .set_billing_address(Address {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                line1: "1 High Street".to_string(),
                city: "London".to_string(),
                postcode: "N1 1AA".to_string(),
                country: Some(Country::new("GB")),
                ..Address::default()
            })
            .unwrap();
        let mut option = DeliveryOption::new("Courier");
        option.uk = RegionTerms::charged(Money::from_major(5));
        basket.set_delivery_option(option).unwrap();
        basket
            .set_voucher(Voucher::new(
                "SAVE10",
                "Save",
                Discount::Percentage(Decimal::from(10)),
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
            ))
            .unwrap();
        basket
            .set_special_requirements(Some("leave with neighbour".to_string()))
            .unwrap();
        basket
    }

    #[test]
    fn test_roundtrip_preserves_everything() {
        let basket = populated_basket();
        let restored = Basket::from_json(basket.to_json()).unwrap();

        assert_eq!(basket, restored);
        let gb = Country::new("GB");
        assert_eq!(basket.totals(&gb), restored.totals(&gb));
    }

    #[test]
    fn test_roundtrip_preserves_frozen_flag() {
        let mut basket = populated_basket();
        basket.freeze();
        let restored = Basket::from_json(basket.to_json()).unwrap();
        assert!(restored.is_frozen());
    }

    #[test]
    fn test_reader_tolerates_unknown_keys() {
        let mut value = populated_basket().to_json();
        value
            .as_object_mut()
            .unwrap()
            .insert("some_future_key".to_string(), serde_json::json!({"x": 1}));
        assert!(Basket::from_json(value).is_ok());
    }

    #[test]
    fn test_reader_tolerates_missing_optional_keys() {
        let value = serde_json::json!({
            "version": 2,
            "lines": [{
                "product_id": ProductId::new(),
                "quantity": 1,
                "unit_price": "9.99"
            }],
            "click_and_collect": false,
            "invoice": false
        });
        let basket = Basket::from_json(value).unwrap();
        assert_eq!(basket.items().len(), 1);
        assert_eq!(basket.items()[0].unit_price, Money::from_minor(999));
        assert!(basket.voucher().is_none());
    }

    #[test]
    fn test_snapshot_carries_interchange_ids() {
        let basket = populated_basket();
        let snapshot = basket.to_snapshot();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.voucher_code.as_deref(), Some("SAVE10"));
        assert_eq!(
            snapshot.delivery_option_id,
            basket.delivery_option().map(|o| o.id)
        );
    }
}
