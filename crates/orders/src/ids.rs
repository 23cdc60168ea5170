//! Order identifiers: internal ids, public references, secret tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Datelike, Utc};
use common::OrderIdFormat;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal unique identifier for an order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random order identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a customer; orders without one are guest orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Creates a new random customer identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Characters used for alpha order references.
const ALPHA_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of an alpha order reference.
const ALPHA_LEN: usize = 8;

/// Number of random bytes behind a secret id; 18 bytes is 144 bits of
/// entropy and encodes without padding.
const SECRET_BYTES: usize = 18;

/// Generates a random 8-character uppercase alphanumeric reference.
///
/// Collisions are possible; the store retries on a uniqueness clash.
pub fn generate_alpha_ref() -> String {
    let mut bytes = [0u8; ALPHA_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| ALPHA_CHARSET[*b as usize % ALPHA_CHARSET.len()] as char)
        .collect()
}

/// Formats a public order reference.
///
/// - `numeric`: `YYMM` plus the zero-padded sequence
/// - `seq`: the bare sequence
/// - `alpha`: random uppercase alphanumeric (ignores the sequence)
///
/// The merchant prefix/suffix wrap the body when configured.
pub fn format_order_ref(
    format: OrderIdFormat,
    prefix: Option<&str>,
    suffix: Option<&str>,
    sequence: u64,
    now: DateTime<Utc>,
) -> String {
    let body = match format {
        OrderIdFormat::Numeric => {
            format!("{:02}{:02}{:04}", now.year() % 100, now.month(), sequence)
        }
        OrderIdFormat::Seq => sequence.to_string(),
        OrderIdFormat::Alpha => generate_alpha_ref(),
    };
    format!(
        "{}{}{}",
        prefix.unwrap_or_default(),
        body,
        suffix.unwrap_or_default()
    )
}

/// Generates an unguessable URL-safe secret id with at least 128 bits of
/// entropy.
pub fn generate_secret_id() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
