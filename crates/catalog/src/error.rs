//! Catalog error types.

use thiserror::Error;

/// Result alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Slug is already taken by another entity of the same kind.
    #[error("slug already in use: {slug}")]
    DuplicateSlug { slug: String },

    /// Saving the category would make it its own ancestor.
    #[error("category hierarchy cycle detected")]
    CategoryCycle,

    /// Another enabled SKU of the product already covers this option
    /// combination.
    #[error("duplicate SKU option combination for product")]
    DuplicateSkuCombination,

    /// SKU options must contribute exactly one option per variety, and
    /// every SKU of a product must use the same varieties.
    #[error("SKU options do not match the product's SKU varieties")]
    SkuVarietyMismatch,

    /// Concurrent modification detected by the optimistic version check.
    #[error("{entity} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        entity: &'static str,
        expected: u64,
        actual: u64,
    },

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}
