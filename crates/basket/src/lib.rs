//! Session-bound basket aggregate.
//!
//! The basket accumulates line items and the metadata needed to price and
//! place an order: addresses, delivery selection, voucher, finance option.
//! The [`Basket`] itself is a pure, synchronous aggregate over already
//! resolved inputs; [`BasketService`] performs the async catalog
//! resolution (variety validation, SKU lookup, voucher checks) in front
//! of it. [`pricing`] computes the money figures, and [`SessionStore`]
//! provides per-key atomic read-modify-write session storage.

pub mod address;
pub mod basket;
pub mod error;
pub mod item;
pub mod pricing;
pub mod service;
pub mod session;
pub mod snapshot;

pub use address::Address;
pub use basket::{Basket, FinanceSelection};
pub use error::BasketError;
pub use item::{BasketItem, LineId};
pub use pricing::Totals;
pub use service::BasketService;
pub use session::SessionStore;
pub use snapshot::{BasketSnapshot, LineSnapshot, SNAPSHOT_VERSION};
