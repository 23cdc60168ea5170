//! Typed identifiers for catalog entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Wrapping prevents mixing up identifiers of different entities.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
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

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a product.
    ProductId
);
entity_id!(
    /// Unique identifier for a category.
    CategoryId
);
entity_id!(
    /// Unique identifier for a variety (a choice dimension).
    VarietyId
);
entity_id!(
    /// Unique identifier for a variety option (a value within a variety).
    VarietyOptionId
);
entity_id!(
    /// Unique identifier for a product SKU.
    SkuId
);
entity_id!(
    /// Unique identifier for a delivery option.
    DeliveryOptionId
);
entity_id!(
    /// Unique identifier for a voucher.
    VoucherId
);
entity_id!(
    /// Unique identifier for a finance option.
    FinanceOptionId
);
