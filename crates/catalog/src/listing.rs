//! Listing-order resolution for category pages.

use crate::category::{Category, ProductOrdering};

/// Chooses the product ordering for a category page.
///
/// Precedence: explicit customer choice (when in `allowed`) → the
/// category's default → the global default → relevance.
pub fn resolve_listing_order(
    customer_choice: Option<&str>,
    allowed: &[ProductOrdering],
    category: Option<&Category>,
    global_default: Option<ProductOrdering>,
) -> ProductOrdering {
    if let Some(raw) = customer_choice
        && let Ok(choice) = raw.parse::<ProductOrdering>()
        && allowed.contains(&choice)
    {
        return choice;
    }

    category
        .and_then(|c| c.ordering_default)
        .or(global_default)
        .unwrap_or(ProductOrdering::Relevance)
}
