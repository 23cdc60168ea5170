//! Delivery options with per-region terms.

use common::{DeliveryRegion, Money};
use serde::{Deserialize, Serialize};

use crate::ids::DeliveryOptionId;

/// Terms for one delivery region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionTerms {
    pub enabled: bool,
    /// The charge is settled out-of-band; orders record no numeric charge.
    pub quote_only: bool,
    pub charge: Money,
}

impl RegionTerms {
    /// Enabled terms with a flat charge.
    pub fn charged(charge: Money) -> Self {
        Self {
            enabled: true,
            quote_only: false,
            charge,
        }
    }

    /// Enabled terms where the charge is quoted out-of-band.
    pub fn quote_only() -> Self {
        Self {
            enabled: true,
            quote_only: true,
            charge: Money::zero(),
        }
    }
}

/// A globally defined delivery method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOption {
    pub id: DeliveryOptionId,
    pub title: String,
    pub enabled: bool,
    /// Waive the charge when the qualifying sub-total meets the threshold.
    pub free_delivery: bool,
    pub free_delivery_threshold: Money,
    pub uk: RegionTerms,
    pub eu: RegionTerms,
    pub world: RegionTerms,
    pub seq: i32,
}

impl DeliveryOption {
    /// Creates an enabled option with all regions disabled.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: DeliveryOptionId::new(),
            title: title.into(),
            enabled: true,
            free_delivery: false,
            free_delivery_threshold: Money::zero(),
            uk: RegionTerms::default(),
            eu: RegionTerms::default(),
            world: RegionTerms::default(),
            seq: 0,
        }
    }

    /// The terms for a region.
    pub fn terms(&self, region: DeliveryRegion) -> &RegionTerms {
        match region {
            DeliveryRegion::Uk => &self.uk,
            DeliveryRegion::Eu => &self.eu,
            DeliveryRegion::World => &self.world,
        }
    }

    /// Returns true if this option can serve the region.
    pub fn serves(&self, region: DeliveryRegion) -> bool {
        self.enabled && self.terms(region).enabled
    }
}
