//! Customer address snapshots.

use common::Country;
use serde::{Deserialize, Serialize};

use crate::error::{BasketError, Result};

/// A postal address captured at checkout.
///
/// Stored by value on baskets and denormalised onto orders; never a
/// reference into a customer profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    /// County; for US addresses this carries the state.
    #[serde(default)]
    pub county: Option<String>,
    pub postcode: String,
    pub country: Option<Country>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
}

impl Address {
    /// The customer's display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Validates that every required field is present.
    pub fn validate_complete(&self) -> Result<()> {
        let missing = if self.first_name.trim().is_empty() {
            Some("first name")
        } else if self.last_name.trim().is_empty() {
            Some("last name")
        } else if self.line1.trim().is_empty() {
            Some("address line 1")
        } else if self.city.trim().is_empty() {
            Some("city")
        } else if self.postcode.trim().is_empty() {
            Some("postcode")
        } else if self.country.is_none() {
            Some("country")
        } else {
            None
        };

        match missing {
            Some(field) => Err(BasketError::AddressIncomplete { field }),
            None => Ok(()),
        }
    }
}
