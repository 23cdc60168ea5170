//! Shared value objects and configuration for the shop core.
//!
//! This crate provides the types every other crate needs:
//! - `Money` for decimal arithmetic with HALF-UP rounding
//! - `Country` and `DeliveryRegion` for delivery bucketing
//! - `ShopConfig` for environment-driven settings

pub mod config;
pub mod country;
pub mod money;

pub use config::{OrderIdFormat, ShopConfig, TrackingProvider};
pub use country::{Country, DeliveryRegion};
pub use money::Money;
