//! Hierarchical categories.

use serde::{Deserialize, Serialize};

use crate::ids::CategoryId;

/// Maximum depth walked when checking for ancestry cycles.
pub const MAX_ANCESTOR_DEPTH: usize = 32;

/// Product ordering choices for category listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductOrdering {
    #[default]
    Relevance,
    DateAdded,
    PriceLowHigh,
    PriceHighLow,
    Name,
}

impl ProductOrdering {
    /// Returns the query-string token for this ordering.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductOrdering::Relevance => "relevance",
            ProductOrdering::DateAdded => "date-added",
            ProductOrdering::PriceLowHigh => "price-low-high",
            ProductOrdering::PriceHighLow => "price-high-low",
            ProductOrdering::Name => "name",
        }
    }
}

impl std::str::FromStr for ProductOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(ProductOrdering::Relevance),
            "date-added" => Ok(ProductOrdering::DateAdded),
            "price-low-high" => Ok(ProductOrdering::PriceLowHigh),
            "price-high-low" => Ok(ProductOrdering::PriceHighLow),
            "name" => Ok(ProductOrdering::Name),
            other => Err(format!("unknown ordering: {other}")),
        }
    }
}

impl std::fmt::Display for ProductOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A taxonomy node.
///
/// The parent reference forms a tree; cycles are rejected on write by an
/// ancestor walk bounded at [`MAX_ANCESTOR_DEPTH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    /// Globally unique URL slug.
    pub slug: String,
    pub parent: Option<CategoryId>,
    pub enabled: bool,
    /// Listing order applied when the customer has not chosen one.
    pub ordering_default: Option<ProductOrdering>,
    /// Old URLs that should redirect to this category.
    pub legacy_urls: Vec<String>,
    pub seq: i32,
    /// Optimistic-concurrency counter, bumped on every save.
    pub version: u64,
}

impl Category {
    /// Creates an enabled category with no parent.
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            title: title.into(),
            slug: slug.into(),
            parent: None,
            enabled: true,
            ordering_default: None,
            legacy_urls: Vec::new(),
            seq: 0,
            version: 0,
        }
    }
}

/// Walks the ancestor chain of `start`, returning the path from root to
/// `start` inclusive, or `None` when a cycle or over-deep chain is found.
///
/// `lookup` resolves a category's parent id.
pub fn ancestor_path(
    start: &Category,
    lookup: impl Fn(CategoryId) -> Option<Category>,
) -> Option<Vec<Category>> {
    let mut path = vec![start.clone()];
    let mut current = start.parent;

    while let Some(parent_id) = current {
        if path.len() > MAX_ANCESTOR_DEPTH || path.iter().any(|c| c.id == parent_id) {
            return None;
        }
        let parent = lookup(parent_id)?;
        current = parent.parent;
        path.push(parent);
    }

    path.reverse();
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(map: &HashMap<CategoryId, Category>) -> impl Fn(CategoryId) -> Option<Category> + '_ {
        move |id| map.get(&id).cloned()
    }

    #[test]
    fn test_ordering_roundtrip() {
        for ordering in [
            ProductOrdering::Relevance,
            ProductOrdering::DateAdded,
            ProductOrdering::PriceLowHigh,
            ProductOrdering::PriceHighLow,
            ProductOrdering::Name,
        ] {
            assert_eq!(ordering.as_str().parse::<ProductOrdering>(), Ok(ordering));
        }
    }

    #[test]
    fn test_unknown_ordering_rejected() {
        assert!("cheapest".parse::<ProductOrdering>().is_err());
    }

    #[test]
    fn test_path_root_only() {
        let root = Category::new("Shop", "shop");
        let map = HashMap::from([(root.id, root.clone())]);
        let path = ancestor_path(&root, lookup_in(&map)).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].id, root.id);
    }

    #[test]
    fn test_path_orders_root_first() {
        let root = Category::new("Shop", "shop");
        let mut child = Category::new("Chairs", "chairs");
        child.parent = Some(root.id);

        let map = HashMap::from([(root.id, root.clone()), (child.id, child.clone())]);
        let path = ancestor_path(&child, lookup_in(&map)).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].id, root.id);
        assert_eq!(path[1].id, child.id);
    }

    #[test]
    fn test_cycle_detected() {
        let mut a = Category::new("A", "a");
        let mut b = Category::new("B", "b");
        a.parent = Some(b.id);
        b.parent = Some(a.id);

        let map = HashMap::from([(a.id, a.clone()), (b.id, b.clone())]);
        assert!(ancestor_path(&a, lookup_in(&map)).is_none());
    }

    #[test]
    fn test_self_parent_detected() {
        let mut a = Category::new("A", "a");
        a.parent = Some(a.id);

        let map = HashMap::from([(a.id, a.clone())]);
        assert!(ancestor_path(&a, lookup_in(&map)).is_none());
    }

    #[test]
    fn test_missing_parent_is_none() {
        let mut orphan = Category::new("Orphan", "orphan");
        orphan.parent = Some(CategoryId::new());

        let map = HashMap::from([(orphan.id, orphan.clone())]);
        assert!(ancestor_path(&orphan, lookup_in(&map)).is_none());
    }
}
