//! Basket operations that need the catalog.
//!
//! [`BasketService`] resolves products, varieties, SKUs, delivery options
//! and vouchers against the catalog, then drives the pure [`Basket`]
//! aggregate. All customer-surfaced validation lives here or in the
//! aggregate; nothing downstream re-checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use catalog::{
    AssignedOption, CatalogStore, DeliveryOptionId, FinanceOptionId, ProductId, VarietyId,
    VarietyOptionId, Voucher, VoucherUsage,
};
use chrono::Utc;
use common::ShopConfig;
use rust_decimal::Decimal;

use crate::basket::{Basket, FinanceSelection};
use crate::error::{BasketError, Result};
use crate::item::{BasketItem, LineId};
use crate::pricing::{self, Totals};

/// Loan deposits must fall in this inclusive percentage range.
const LOAN_DEPOSIT_RANGE: (u32, u32) = (10, 50);

/// Catalog-aware basket operations.
pub struct BasketService<C, U> {
    catalog: Arc<C>,
    voucher_usage: Arc<U>,
    config: ShopConfig,
}

impl<C: CatalogStore, U: VoucherUsage> BasketService<C, U> {
    /// Creates a new basket service.
    pub fn new(catalog: Arc<C>, voucher_usage: Arc<U>, config: ShopConfig) -> Self {
        Self {
            catalog,
            voucher_usage,
            config,
        }
    }

    /// Returns the shop configuration in force.
    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    /// Adds a product to the basket.
    ///
    /// Every enabled non-attribute variety assigned to the product must
    /// contribute exactly one selected option. Products with SKUs enabled
    /// must resolve to a unique enabled SKU; the SKU price then
    /// supersedes the base price and offsets.
    #[tracing::instrument(skip(self, basket, labels, custom), fields(product = %product_id))]
    pub async fn add(
        &self,
        basket: &mut Basket,
        product_id: ProductId,
        quantity: u32,
        selected_options: &[VarietyOptionId],
        labels: BTreeMap<VarietyOptionId, String>,
        custom: BTreeMap<String, String>,
    ) -> Result<LineId> {
        if basket.is_frozen() {
            return Err(BasketError::BasketFrozen);
        }

        let product = self
            .catalog
            .product(product_id)
            .await?
            .filter(|p| p.is_addable())
            .ok_or(BasketError::ProductUnavailable)?;

        let assigned = self.catalog.assigned_options(product.id).await?;
        let selection: BTreeSet<VarietyOptionId> = selected_options.iter().copied().collect();
        validate_selection(&assigned, &selection, &labels)?;

        let (sku_id, sku_code, unit_price) = if product.sku_enabled {
            let sku = self
                .catalog
                .find_sku(product.id, &selection)
                .await?
                .ok_or(BasketError::SkuNotFound)?;
            (
                Some(sku.id),
                Some(sku.sku.clone()),
                sku.unit_price(product.price),
            )
        } else {
            let offsets = assigned
                .iter()
                .filter(|a| selection.contains(&a.option.id))
                .map(AssignedOption::effective_offset);
            (None, None, pricing::unit_price_with_offsets(product.price, offsets))
        };

        let item = BasketItem {
            id: LineId::new(),
            product_id: product.id,
            title: product.title.clone(),
            quantity,
            unit_price,
            sku_id,
            sku_code,
            variety_option_ids: selection,
            labels,
            custom,
            categories: product.all_categories(),
            collection_only: product.collection_only,
            exempt_from_free_delivery: product.exempt_from_free_delivery,
            exempt_from_discount: product.exempt_from_discount,
        };

        let line_id = basket.add_item(item, self.config.max_quantity)?;
        self.revalidate_voucher(basket).await?;
        Ok(line_id)
    }

    /// Changes a line's quantity, then re-checks the voucher.
    pub async fn update_quantity(
        &self,
        basket: &mut Basket,
        line_id: LineId,
        quantity: u32,
    ) -> Result<()> {
        basket.update_quantity(line_id, quantity, self.config.max_quantity)?;
        self.revalidate_voucher(basket).await
    }

    /// Removes a line, then re-checks the voucher.
    pub async fn remove(&self, basket: &mut Basket, line_id: LineId) -> Result<()> {
        basket.remove(line_id)?;
        self.revalidate_voucher(basket).await
    }

    /// Stores the billing address after completeness validation.
    pub fn set_billing_address(&self, basket: &mut Basket, address: crate::Address) -> Result<()> {
        address.validate_complete()?;
        basket.set_billing_address(address)
    }

    /// Stores the delivery address after completeness validation.
    pub async fn set_delivery_address(
        &self,
        basket: &mut Basket,
        address: crate::Address,
    ) -> Result<()> {
        address.validate_complete()?;
        basket.set_delivery_address(address)?;
        // The delivery country may have changed region or voucher
        // eligibility.
        if let Some(option) = basket.delivery_option().cloned() {
            let country = basket.delivery_country(&self.config.default_country);
            if !option.serves(country.region()) {
                basket.clear_delivery_option()?;
            }
        }
        self.revalidate_voucher(basket).await
    }

    /// Selects a delivery option; it must be enabled and serve the
    /// current delivery country's region.
    #[tracing::instrument(skip(self, basket), fields(option = %option_id))]
    pub async fn set_delivery_option(
        &self,
        basket: &mut Basket,
        option_id: DeliveryOptionId,
    ) -> Result<()> {
        let option = self
            .catalog
            .delivery_option(option_id)
            .await?
            .ok_or(BasketError::DeliveryOptionUnavailable)?;
        let country = basket.delivery_country(&self.config.default_country);
        if !option.serves(country.region()) {
            return Err(BasketError::DeliveryOptionUnavailable);
        }
        basket.set_delivery_option(option)
    }

    /// Applies a voucher by code (case-insensitive).
    #[tracing::instrument(skip(self, basket))]
    pub async fn apply_voucher(&self, basket: &mut Basket, code: &str) -> Result<()> {
        if basket.is_frozen() {
            return Err(BasketError::BasketFrozen);
        }
        let voucher = self
            .catalog
            .voucher_by_code(code)
            .await?
            .filter(|v| v.enabled)
            .ok_or(BasketError::VoucherNotFound)?;

        self.check_voucher(basket, &voucher).await?;
        basket.set_voucher(voucher)
    }

    /// Re-runs voucher checks after a basket mutation, silently dropping
    /// a voucher that no longer applies.
    pub async fn revalidate_voucher(&self, basket: &mut Basket) -> Result<()> {
        let Some(voucher) = basket.voucher().cloned() else {
            return Ok(());
        };
        if let Err(reason) = self.check_voucher(basket, &voucher).await {
            tracing::debug!(code = %voucher.code, %reason, "voucher no longer applies, removing");
            basket.clear_voucher()?;
        }
        Ok(())
    }

    async fn check_voucher(&self, basket: &Basket, voucher: &Voucher) -> Result<()> {
        if !voucher.in_window(Utc::now().date_naive()) {
            return Err(BasketError::VoucherExpired);
        }
        let usage = self
            .voucher_usage
            .successful_uses(&voucher.code)
            .await
            .map_err(BasketError::Catalog)?;
        if voucher.exhausted(usage) {
            return Err(BasketError::VoucherExhausted);
        }
        let country = basket.delivery_country(&self.config.default_country);
        if !voucher.allows_country(&country) {
            return Err(BasketError::VoucherCountryMismatch);
        }
        if !voucher.categories.is_empty()
            && !basket
                .items()
                .iter()
                .any(|line| voucher.allows_categories(&line.categories))
        {
            return Err(BasketError::VoucherCategoryMismatch);
        }
        Ok(())
    }

    /// Applies a finance option with the customer's deposit percentage.
    #[tracing::instrument(skip(self, basket), fields(option = %option_id))]
    pub async fn apply_finance_option(
        &self,
        basket: &mut Basket,
        option_id: FinanceOptionId,
        deposit_percent: Decimal,
    ) -> Result<()> {
        if basket.is_frozen() {
            return Err(BasketError::BasketFrozen);
        }
        if !self.config.loan_enabled {
            return Err(BasketError::FinanceOptionUnavailable {
                reason: "finance is not offered",
            });
        }
        let option = self
            .catalog
            .finance_option(option_id)
            .await?
            .filter(|o| o.enabled)
            .ok_or(BasketError::FinanceOptionUnavailable {
                reason: "unknown finance option",
            })?;

        let (min, max) = LOAN_DEPOSIT_RANGE;
        if deposit_percent < Decimal::from(min) || deposit_percent > Decimal::from(max) {
            return Err(BasketError::FinanceOptionUnavailable {
                reason: "deposit must be between 10% and 50%",
            });
        }
        if basket.sub_total() < option.min_basket_value {
            return Err(BasketError::FinanceOptionUnavailable {
                reason: "basket value is below the minimum for this option",
            });
        }
        if option.per_product {
            for line in basket.items() {
                let allowed = self
                    .catalog
                    .product(line.product_id)
                    .await?
                    .map(|p| p.finance_options.contains(&option.id))
                    .unwrap_or(false);
                if !allowed {
                    return Err(BasketError::FinanceOptionUnavailable {
                        reason: "not every item can be bought on this option",
                    });
                }
            }
        }

        basket.set_finance(FinanceSelection {
            option,
            deposit_percent,
        })
    }

    /// Prices the basket.
    pub fn totals(&self, basket: &Basket) -> Totals {
        basket.totals(&self.config.default_country)
    }

    /// Validates the basket is ready to become an order.
    pub fn validate_for_checkout(&self, basket: &Basket) -> Result<()> {
        if basket.is_empty() {
            return Err(BasketError::LineNotFound);
        }
        let billing = basket
            .billing_address()
            .ok_or(BasketError::AddressIncomplete {
                field: "billing address",
            })?;
        billing.validate_complete()?;

        if basket.is_collection_only() && !basket.click_and_collect() {
            return Err(BasketError::DeliveryOptionUnavailable);
        }

        if !basket.click_and_collect() {
            let delivery = basket
                .delivery_address()
                .ok_or(BasketError::AddressIncomplete {
                    field: "delivery address",
                })?;
            delivery.validate_complete()?;

            let option = basket
                .delivery_option()
                .ok_or(BasketError::DeliveryOptionUnavailable)?;
            let country = basket.delivery_country(&self.config.default_country);
            if !option.serves(country.region()) {
                return Err(BasketError::DeliveryOptionUnavailable);
            }
        }
        Ok(())
    }
}

/// Validates the selected options against the product's assignments.
fn validate_selection(
    assigned: &[AssignedOption],
    selection: &BTreeSet<VarietyOptionId>,
    labels: &BTreeMap<VarietyOptionId, String>,
) -> Result<()> {
    // Every selected option must be assigned to the product and belong
    // to a purchasable variety.
    for option_id in selection {
        let Some(assignment) = assigned.iter().find(|a| a.option.id == *option_id) else {
            return Err(BasketError::InvalidVarietySelection);
        };
        if !assignment.variety.is_purchase_choice() {
            return Err(BasketError::InvalidVarietySelection);
        }
    }

    // Every purchasable variety must contribute exactly one option.
    let mut varieties_seen: BTreeMap<VarietyId, usize> = BTreeMap::new();
    for assignment in assigned {
        if assignment.variety.is_purchase_choice() {
            varieties_seen.entry(assignment.variety.id).or_insert(0);
        }
    }
    for option_id in selection {
        if let Some(assignment) = assigned.iter().find(|a| a.option.id == *option_id) {
            *varieties_seen.entry(assignment.variety.id).or_insert(0) += 1;
        }
    }
    if varieties_seen.values().any(|&count| count != 1) {
        return Err(BasketError::InvalidVarietySelection);
    }

    // Labels may only accompany selected options that allow typed text.
    for option_id in labels.keys() {
        let valid = selection.contains(option_id)
            && assigned
                .iter()
                .any(|a| a.option.id == *option_id && a.option.text_label);
        if !valid {
            return Err(BasketError::InvalidVarietySelection);
        }
    }

    Ok(())
}
