//! Delivery countries and region buckets.

use serde::{Deserialize, Serialize};

/// ISO 3166-1 alpha-2 country code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Country(String);

/// EU member states for delivery-region bucketing.
const EU_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT", "LV",
    "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

impl Country {
    /// Creates a country from an ISO code, normalising to uppercase.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    /// Returns the ISO code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the United States (drives county-vs-state
    /// handling in address snapshots).
    pub fn is_us(&self) -> bool {
        self.0 == "US"
    }

    /// Returns the delivery-charge region bucket for this country.
    pub fn region(&self) -> DeliveryRegion {
        match self.0.as_str() {
            "GB" | "UK" | "IM" | "JE" | "GG" => DeliveryRegion::Uk,
            code if EU_COUNTRIES.contains(&code) => DeliveryRegion::Eu,
            _ => DeliveryRegion::World,
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Country {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Delivery-charge region bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryRegion {
    Uk,
    Eu,
    World,
}

impl DeliveryRegion {
    /// Returns the region name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryRegion::Uk => "UK",
            DeliveryRegion::Eu => "EU",
            DeliveryRegion::World => "World",
        }
    }
}

impl std::fmt::Display for DeliveryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalises_to_uppercase() {
        assert_eq!(Country::new("gb").as_str(), "GB");
        assert_eq!(Country::new(" de ").as_str(), "DE");
    }

    #[test]
    fn test_uk_region() {
        assert_eq!(Country::new("GB").region(), DeliveryRegion::Uk);
        assert_eq!(Country::new("JE").region(), DeliveryRegion::Uk);
    }

    #[test]
    fn test_eu_region() {
        assert_eq!(Country::new("DE").region(), DeliveryRegion::Eu);
        assert_eq!(Country::new("FR").region(), DeliveryRegion::Eu);
    }

    #[test]
    fn test_world_region() {
        assert_eq!(Country::new("US").region(), DeliveryRegion::World);
        assert_eq!(Country::new("AU").region(), DeliveryRegion::World);
    }

    #[test]
    fn test_is_us() {
        assert!(Country::new("us").is_us());
        assert!(!Country::new("GB").is_us());
    }
}
