//! The basket aggregate.

use catalog::{DeliveryOption, FinanceOption, Voucher};
use common::{Country, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{BasketError, Result};
use crate::item::{BasketItem, LineId};
use crate::pricing::{self, Totals};

/// A chosen finance option with the customer's deposit percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceSelection {
    pub option: FinanceOption,
    pub deposit_percent: Decimal,
}

/// Session-scoped mutable order draft.
///
/// Pure and synchronous: every mutator takes already resolved catalog
/// state. Catalog resolution and cross-entity validation live in
/// [`crate::BasketService`]. Once frozen (its order has been placed) every
/// mutator fails with [`BasketError::BasketFrozen`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Basket {
    pub(crate) items: Vec<BasketItem>,
    pub(crate) billing_address: Option<Address>,
    pub(crate) delivery_address: Option<Address>,
    /// Snapshot of the selected delivery option.
    pub(crate) delivery_option: Option<DeliveryOption>,
    pub(crate) click_and_collect: bool,
    /// Snapshot of the applied voucher.
    pub(crate) voucher: Option<Voucher>,
    pub(crate) finance: Option<FinanceSelection>,
    pub(crate) free_delivery_code: Option<String>,
    pub(crate) survey_answer: Option<String>,
    pub(crate) special_requirements: Option<String>,
    pub(crate) invoice: bool,
    pub(crate) frozen: bool,
}

impl Basket {
    /// Creates an empty basket.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Queries --

    pub fn items(&self) -> &[BasketItem] {
        &self.items
    }

    pub fn item(&self, line_id: LineId) -> Option<&BasketItem> {
        self.items.iter().find(|i| i.id == line_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Any collection-only line forces the whole basket to
    /// click-and-collect.
    pub fn is_collection_only(&self) -> bool {
        self.items.iter().any(|i| i.collection_only)
    }

    pub fn can_edit_billing_address(&self) -> bool {
        !self.frozen
    }

    pub fn can_edit_delivery_address(&self) -> bool {
        !self.frozen
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    pub fn delivery_address(&self) -> Option<&Address> {
        self.delivery_address.as_ref()
    }

    pub fn delivery_option(&self) -> Option<&DeliveryOption> {
        self.delivery_option.as_ref()
    }

    pub fn click_and_collect(&self) -> bool {
        self.click_and_collect
    }

    pub fn voucher(&self) -> Option<&Voucher> {
        self.voucher.as_ref()
    }

    pub fn finance(&self) -> Option<&FinanceSelection> {
        self.finance.as_ref()
    }

    pub fn free_delivery_code(&self) -> Option<&str> {
        self.free_delivery_code.as_deref()
    }

    pub fn survey_answer(&self) -> Option<&str> {
        self.survey_answer.as_deref()
    }

    pub fn special_requirements(&self) -> Option<&str> {
        self.special_requirements.as_deref()
    }

    pub fn invoice(&self) -> bool {
        self.invoice
    }

    /// The country delivery is charged and validated against: the
    /// delivery address country, falling back to the billing address and
    /// then the shop default. Click-and-collect orders are domestic.
    pub fn delivery_country(&self, default: &Country) -> Country {
        if self.click_and_collect {
            return default.clone();
        }
        self.delivery_address
            .as_ref()
            .and_then(|a| a.country.clone())
            .or_else(|| self.billing_address.as_ref().and_then(|a| a.country.clone()))
            .unwrap_or_else(|| default.clone())
    }

    /// The total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Prices the basket. See [`crate::pricing`].
    pub fn totals(&self, default_country: &Country) -> Totals {
        pricing::price_basket(self, &self.delivery_country(default_country))
    }

    /// The sum of line totals, before discount and delivery.
    pub fn sub_total(&self) -> Money {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    // -- Mutations --

    fn ensure_editable(&self) -> Result<()> {
        if self.frozen {
            Err(BasketError::BasketFrozen)
        } else {
            Ok(())
        }
    }

    /// Adds a resolved line, merging into an existing line when the
    /// identity matches. Merged quantities cap at `max_quantity`.
    pub fn add_item(&mut self, item: BasketItem, max_quantity: u32) -> Result<LineId> {
        self.ensure_editable()?;
        if item.quantity == 0 {
            return Err(BasketError::InvalidQuantity);
        }
        if item.quantity > max_quantity {
            return Err(BasketError::QuantityExceedsCap { max: max_quantity });
        }

        if let Some(existing) = self.items.iter_mut().find(|i| i.merges_with(&item)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity).min(max_quantity);
            return Ok(existing.id);
        }

        let id = item.id;
        self.items.push(item);
        Ok(id)
    }

    /// Replaces a line's quantity.
    pub fn update_quantity(&mut self, line_id: LineId, quantity: u32, max_quantity: u32) -> Result<()> {
        self.ensure_editable()?;
        if quantity == 0 {
            return Err(BasketError::InvalidQuantity);
        }
        if quantity > max_quantity {
            return Err(BasketError::QuantityExceedsCap { max: max_quantity });
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == line_id)
            .ok_or(BasketError::LineNotFound)?;
        item.quantity = quantity;
        Ok(())
    }

    /// Removes a line.
    pub fn remove(&mut self, line_id: LineId) -> Result<()> {
        self.ensure_editable()?;
        let before = self.items.len();
        self.items.retain(|i| i.id != line_id);
        if self.items.len() == before {
            return Err(BasketError::LineNotFound);
        }
        Ok(())
    }

    pub fn set_billing_address(&mut self, address: Address) -> Result<()> {
        self.ensure_editable()?;
        self.billing_address = Some(address);
        Ok(())
    }

    pub fn set_delivery_address(&mut self, address: Address) -> Result<()> {
        self.ensure_editable()?;
        self.delivery_address = Some(address);
        Ok(())
    }

    pub fn set_click_and_collect(&mut self, click_and_collect: bool) -> Result<()> {
        self.ensure_editable()?;
        if !click_and_collect && self.is_collection_only() {
            return Err(BasketError::DeliveryOptionUnavailable);
        }
        self.click_and_collect = click_and_collect;
        Ok(())
    }

    /// Stores a delivery option snapshot. Collection-only baskets take no
    /// delivery option; region availability is checked by the service.
    pub fn set_delivery_option(&mut self, option: DeliveryOption) -> Result<()> {
        self.ensure_editable()?;
        if self.is_collection_only() {
            return Err(BasketError::DeliveryOptionUnavailable);
        }
        self.delivery_option = Some(option);
        Ok(())
    }

    pub fn clear_delivery_option(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.delivery_option = None;
        Ok(())
    }

    /// Stores a validated voucher snapshot.
    pub fn set_voucher(&mut self, voucher: Voucher) -> Result<()> {
        self.ensure_editable()?;
        self.voucher = Some(voucher);
        Ok(())
    }

    pub fn clear_voucher(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.voucher = None;
        Ok(())
    }

    pub fn set_finance(&mut self, finance: FinanceSelection) -> Result<()> {
        self.ensure_editable()?;
        self.finance = Some(finance);
        Ok(())
    }

    pub fn clear_finance(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.finance = None;
        Ok(())
    }

    pub fn set_free_delivery_code(&mut self, code: Option<String>) -> Result<()> {
        self.ensure_editable()?;
        self.free_delivery_code = code;
        Ok(())
    }

    pub fn set_survey_answer(&mut self, answer: Option<String>) -> Result<()> {
        self.ensure_editable()?;
        self.survey_answer = answer;
        Ok(())
    }

    pub fn set_special_requirements(&mut self, text: Option<String>) -> Result<()> {
        self.ensure_editable()?;
        self.special_requirements = text;
        Ok(())
    }

    pub fn set_invoice(&mut self, invoice: bool) -> Result<()> {
        self.ensure_editable()?;
        self.invoice = invoice;
        Ok(())
    }

    /// Freezes the basket. Idempotent; there is no thaw.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}
