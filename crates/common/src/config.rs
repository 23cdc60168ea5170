//! Shop configuration loaded from environment variables.

use serde::{Deserialize, Serialize};

use crate::country::Country;

/// Hard upper bound on line quantity, regardless of configuration.
pub const QUANTITY_CEILING: u32 = 9999;

/// Format of the public order reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderIdFormat {
    /// `YYMM` plus a monotonic counter.
    #[default]
    Numeric,
    /// Pure monotonic counter.
    Seq,
    /// Eight uppercase alphanumeric characters.
    Alpha,
}

impl std::str::FromStr for OrderIdFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "numeric" => Ok(OrderIdFormat::Numeric),
            "seq" => Ok(OrderIdFormat::Seq),
            "alpha" => Ok(OrderIdFormat::Alpha),
            other => Err(format!("unknown order id format: {other}")),
        }
    }
}

/// A shipment tracking provider: display name plus tracking URL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingProvider {
    pub name: String,
    pub url: String,
}

/// Shop-wide settings with sensible defaults.
///
/// Reads from environment variables:
/// - `MAX_QUANTITY` — per-line quantity cap (default `99`, ceiling `9999`)
/// - `SHOP_PREAUTH` — register payments as preauth, requiring approval
/// - `SHOP_LOAN_ENABLED` — enable finance options at checkout
/// - `SHOP_TEST_MODE` — gateways run against their test endpoints
/// - `TRACKING_PROVIDERS` — `name=url` pairs separated by `;`
/// - `CURRENCY` — ISO currency code (default `"GBP"`)
/// - `DEFAULT_BARCODE_SYSTEM` — barcode system for new products
/// - `DEFAULT_COUNTRY` — ISO country assumed before an address is given
/// - `ORDER_ID_FORMAT` — `numeric` | `seq` | `alpha`
/// - `ORDER_ID_PREFIX` / `ORDER_ID_SUFFIX` — merchant decoration
/// - `APPROVAL_TTL_HOURS` — hours before waiting approvals time out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub max_quantity: u32,
    pub preauth: bool,
    pub loan_enabled: bool,
    pub test_mode: bool,
    pub tracking_providers: Vec<TrackingProvider>,
    pub currency: String,
    pub default_barcode_system: String,
    pub default_country: Country,
    pub order_id_format: OrderIdFormat,
    pub order_id_prefix: Option<String>,
    pub order_id_suffix: Option<String>,
    pub approval_ttl_hours: i64,
}

impl ShopConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_quantity: std::env::var("MAX_QUANTITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_quantity)
                .min(QUANTITY_CEILING),
            preauth: env_bool("SHOP_PREAUTH", defaults.preauth),
            loan_enabled: env_bool("SHOP_LOAN_ENABLED", defaults.loan_enabled),
            test_mode: env_bool("SHOP_TEST_MODE", defaults.test_mode),
            tracking_providers: std::env::var("TRACKING_PROVIDERS")
                .map(|v| parse_tracking_providers(&v))
                .unwrap_or(defaults.tracking_providers),
            currency: std::env::var("CURRENCY").unwrap_or(defaults.currency),
            default_barcode_system: std::env::var("DEFAULT_BARCODE_SYSTEM")
                .unwrap_or(defaults.default_barcode_system),
            default_country: std::env::var("DEFAULT_COUNTRY")
                .map(Country::new)
                .unwrap_or(defaults.default_country),
            order_id_format: std::env::var("ORDER_ID_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.order_id_format),
            order_id_prefix: std::env::var("ORDER_ID_PREFIX").ok().filter(|s| !s.is_empty()),
            order_id_suffix: std::env::var("ORDER_ID_SUFFIX").ok().filter(|s| !s.is_empty()),
            approval_ttl_hours: std::env::var("APPROVAL_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.approval_ttl_hours),
        }
    }

    /// Looks up a tracking provider by name.
    pub fn tracking_provider(&self, name: &str) -> Option<&TrackingProvider> {
        self.tracking_providers.iter().find(|p| p.name == name)
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            max_quantity: 99,
            preauth: false,
            loan_enabled: false,
            test_mode: false,
            tracking_providers: Vec::new(),
            currency: "GBP".to_string(),
            default_barcode_system: "EAN13".to_string(),
            default_country: Country::new("GB"),
            order_id_format: OrderIdFormat::Numeric,
            order_id_prefix: None,
            order_id_suffix: None,
            approval_ttl_hours: 72,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn parse_tracking_providers(raw: &str) -> Vec<TrackingProvider> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(TrackingProvider {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}
