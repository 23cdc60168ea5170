//! Basket error types.

use thiserror::Error;

/// Result alias for basket operations.
pub type Result<T> = std::result::Result<T, BasketError>;

/// Errors surfaced to the customer from basket operations.
#[derive(Debug, Error)]
pub enum BasketError {
    /// The variety selection does not match the product's varieties.
    #[error("please choose a valid option for each product variety")]
    InvalidVarietySelection,

    /// No enabled SKU covers the selected option combination.
    #[error("this combination of options is not available")]
    SkuNotFound,

    /// The product cannot currently be purchased.
    #[error("this product is not available")]
    ProductUnavailable,

    /// Quantity exceeds the per-line cap.
    #[error("quantity may not exceed {max}")]
    QuantityExceedsCap { max: u32 },

    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The basket belongs to a placed order and can no longer change.
    #[error("this basket can no longer be changed")]
    BasketFrozen,

    /// The referenced line does not exist.
    #[error("no such item in the basket")]
    LineNotFound,

    /// No voucher matches the code.
    #[error("voucher code not recognised")]
    VoucherNotFound,

    /// The voucher is outside its validity window.
    #[error("this voucher has expired")]
    VoucherExpired,

    /// The voucher has reached its usage cap.
    #[error("this voucher has been fully redeemed")]
    VoucherExhausted,

    /// The voucher is not valid for the delivery country.
    #[error("this voucher is not valid for your delivery country")]
    VoucherCountryMismatch,

    /// No basket line falls in the voucher's categories.
    #[error("this voucher does not apply to the items in your basket")]
    VoucherCategoryMismatch,

    /// The delivery option cannot serve the basket.
    #[error("this delivery option is not available for your order")]
    DeliveryOptionUnavailable,

    /// A required address field is missing.
    #[error("address is incomplete: missing {field}")]
    AddressIncomplete { field: &'static str },

    /// The finance option cannot be taken on this basket.
    #[error("this finance option is not available for your order: {reason}")]
    FinanceOptionUnavailable { reason: &'static str },

    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),
}
