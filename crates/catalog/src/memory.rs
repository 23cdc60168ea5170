//! In-memory catalog store for tests and single-node deployments.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::category::{Category, MAX_ANCESTOR_DEPTH};
use crate::delivery::DeliveryOption;
use crate::error::{CatalogError, Result};
use crate::finance::FinanceOption;
use crate::ids::{
    CategoryId, DeliveryOptionId, FinanceOptionId, ProductId, SkuId, VarietyId, VarietyOptionId,
};
use crate::product::Product;
use crate::sku::ProductSku;
use crate::store::{AssignedOption, CatalogStore, StockDecrement};
use crate::variety::{Variety, VarietyAssignment, VarietyOption};
use crate::voucher::Voucher;

#[derive(Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    categories: HashMap<CategoryId, Category>,
    varieties: HashMap<VarietyId, Variety>,
    options: HashMap<VarietyOptionId, VarietyOption>,
    assignments: Vec<VarietyAssignment>,
    skus: HashMap<SkuId, ProductSku>,
    delivery_options: HashMap<DeliveryOptionId, DeliveryOption>,
    vouchers: HashMap<String, Voucher>,
    finance_options: HashMap<FinanceOptionId, FinanceOption>,
}

/// In-memory catalog store implementation.
///
/// Provides the same interface and invariant enforcement as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of products stored.
    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }
}

/// Validates that a SKU's options draw exactly one option from each of a
/// consistent variety set, against any existing enabled SKUs of the
/// product.
fn validate_sku_varieties(state: &CatalogState, sku: &ProductSku) -> Result<()> {
    let mut varieties = BTreeSet::new();
    for option_id in &sku.options {
        let option = state
            .options
            .get(option_id)
            .ok_or_else(|| CatalogError::NotFound {
                entity: "variety option",
                id: option_id.to_string(),
            })?;
        // One option per variety.
        if !varieties.insert(option.variety) {
            return Err(CatalogError::SkuVarietyMismatch);
        }
    }

    for existing in state.skus.values() {
        if existing.product != sku.product || !existing.enabled || existing.id == sku.id {
            continue;
        }
        if existing.enabled && sku.enabled && existing.options == sku.options {
            return Err(CatalogError::DuplicateSkuCombination);
        }
        let existing_varieties: BTreeSet<VarietyId> = existing
            .options
            .iter()
            .filter_map(|id| state.options.get(id))
            .map(|o| o.variety)
            .collect();
        if existing_varieties != varieties {
            return Err(CatalogError::SkuVarietyMismatch);
        }
    }

    Ok(())
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        Ok(self
            .state
            .read()
            .await
            .products
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn save_product(&self, mut product: Product) -> Result<Product> {
        let mut state = self.state.write().await;

        if state
            .products
            .values()
            .any(|p| p.id != product.id && p.slug == product.slug)
        {
            return Err(CatalogError::DuplicateSlug {
                slug: product.slug.clone(),
            });
        }

        if let Some(existing) = state.products.get(&product.id)
            && existing.version != product.version
        {
            return Err(CatalogError::VersionConflict {
                entity: "product",
                expected: product.version,
                actual: existing.version,
            });
        }

        product.version += 1;
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn assigned_options(&self, product: ProductId) -> Result<Vec<AssignedOption>> {
        let state = self.state.read().await;
        let mut assigned = Vec::new();
        for assignment in state.assignments.iter().filter(|a| a.product == product) {
            let Some(option) = state.options.get(&assignment.option) else {
                continue;
            };
            if !option.enabled {
                continue;
            }
            let Some(variety) = state.varieties.get(&option.variety) else {
                continue;
            };
            assigned.push(AssignedOption {
                variety: variety.clone(),
                option: option.clone(),
                offset_override: assignment.offset_override,
            });
        }
        assigned.sort_by_key(|a| (a.variety.seq, a.variety.id, a.option.seq, a.option.id));
        Ok(assigned)
    }

    async fn save_variety(&self, variety: Variety) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .varieties
            .values()
            .any(|v| v.id != variety.id && v.slug == variety.slug)
        {
            return Err(CatalogError::DuplicateSlug {
                slug: variety.slug.clone(),
            });
        }
        state.varieties.insert(variety.id, variety);
        Ok(())
    }

    async fn save_variety_option(&self, option: VarietyOption) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.varieties.contains_key(&option.variety) {
            return Err(CatalogError::NotFound {
                entity: "variety",
                id: option.variety.to_string(),
            });
        }
        state.options.insert(option.id, option);
        Ok(())
    }

    async fn delete_variety_option(&self, id: VarietyOptionId) -> Result<()> {
        let mut state = self.state.write().await;
        state.options.remove(&id);
        state.assignments.retain(|a| a.option != id);
        // Deleting an option deletes every SKU that references it.
        state.skus.retain(|_, sku| !sku.options.contains(&id));
        Ok(())
    }

    async fn save_assignment(&self, assignment: VarietyAssignment) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.options.contains_key(&assignment.option) {
            return Err(CatalogError::NotFound {
                entity: "variety option",
                id: assignment.option.to_string(),
            });
        }
        if let Some(existing) = state
            .assignments
            .iter_mut()
            .find(|a| a.product == assignment.product && a.option == assignment.option)
        {
            *existing = assignment;
        } else {
            state.assignments.push(assignment);
        }
        Ok(())
    }

    async fn sku(&self, id: SkuId) -> Result<Option<ProductSku>> {
        Ok(self.state.read().await.skus.get(&id).cloned())
    }

    async fn find_sku(
        &self,
        product: ProductId,
        options: &BTreeSet<VarietyOptionId>,
    ) -> Result<Option<ProductSku>> {
        Ok(self
            .state
            .read()
            .await
            .skus
            .values()
            .find(|s| s.product == product && s.enabled && s.matches(options))
            .cloned())
    }

    async fn save_sku(&self, sku: ProductSku) -> Result<()> {
        let mut state = self.state.write().await;
        validate_sku_varieties(&state, &sku)?;
        state.skus.insert(sku.id, sku);
        Ok(())
    }

    async fn decrement_product_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;

        let requested = i64::from(quantity);
        let applied = requested.min(product.stocklevel).max(0);
        product.stocklevel -= applied;
        Ok(StockDecrement {
            requested,
            applied,
            remaining: product.stocklevel,
        })
    }

    async fn decrement_sku_stock(&self, id: SkuId, quantity: u32) -> Result<StockDecrement> {
        let mut state = self.state.write().await;
        let sku = state.skus.get_mut(&id).ok_or_else(|| CatalogError::NotFound {
            entity: "SKU",
            id: id.to_string(),
        })?;

        let requested = i64::from(quantity);
        let applied = requested.min(sku.stocklevel).max(0);
        sku.stocklevel -= applied;
        Ok(StockDecrement {
            requested,
            applied,
            remaining: sku.stocklevel,
        })
    }

    async fn delivery_option(&self, id: DeliveryOptionId) -> Result<Option<DeliveryOption>> {
        Ok(self.state.read().await.delivery_options.get(&id).cloned())
    }

    async fn delivery_options(&self) -> Result<Vec<DeliveryOption>> {
        let state = self.state.read().await;
        let mut options: Vec<_> = state
            .delivery_options
            .values()
            .filter(|o| o.enabled)
            .cloned()
            .collect();
        options.sort_by_key(|o| (o.seq, o.id));
        Ok(options)
    }

    async fn save_delivery_option(&self, option: DeliveryOption) -> Result<()> {
        self.state
            .write()
            .await
            .delivery_options
            .insert(option.id, option);
        Ok(())
    }

    async fn voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        let normalised = Voucher::normalise_code(code);
        Ok(self.state.read().await.vouchers.get(&normalised).cloned())
    }

    async fn save_voucher(&self, voucher: Voucher) -> Result<()> {
        self.state
            .write()
            .await
            .vouchers
            .insert(voucher.code.clone(), voucher);
        Ok(())
    }

    async fn finance_option(&self, id: FinanceOptionId) -> Result<Option<FinanceOption>> {
        Ok(self.state.read().await.finance_options.get(&id).cloned())
    }

    async fn save_finance_option(&self, option: FinanceOption) -> Result<()> {
        self.state
            .write()
            .await
            .finance_options
            .insert(option.id, option);
        Ok(())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by_key(|c| (c.seq, c.id));
        Ok(categories)
    }

    async fn category_path(&self, id: CategoryId) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let start = state
            .categories
            .get(&id)
            .ok_or_else(|| CatalogError::NotFound {
                entity: "category",
                id: id.to_string(),
            })?;

        let mut path = vec![start.clone()];
        let mut current = start.parent;
        while let Some(parent_id) = current {
            if path.len() > MAX_ANCESTOR_DEPTH || path.iter().any(|c| c.id == parent_id) {
                return Err(CatalogError::CategoryCycle);
            }
            let parent = state
                .categories
                .get(&parent_id)
                .ok_or_else(|| CatalogError::NotFound {
                    entity: "category",
                    id: parent_id.to_string(),
                })?;
            current = parent.parent;
            path.push(parent.clone());
        }
        path.reverse();
        Ok(path)
    }

    async fn save_category(&self, mut category: Category) -> Result<Category> {
        let mut state = self.state.write().await;

        if state
            .categories
            .values()
            .any(|c| c.id != category.id && c.slug == category.slug)
        {
            return Err(CatalogError::DuplicateSlug {
                slug: category.slug.clone(),
            });
        }

        if let Some(existing) = state.categories.get(&category.id)
            && existing.version != category.version
        {
            return Err(CatalogError::VersionConflict {
                entity: "category",
                expected: category.version,
                actual: existing.version,
            });
        }

        // Walk the would-be ancestor chain before committing the write.
        let mut seen = vec![category.id];
        let mut current = category.parent;
        while let Some(parent_id) = current {
            if seen.len() > MAX_ANCESTOR_DEPTH || seen.contains(&parent_id) {
                return Err(CatalogError::CategoryCycle);
            }
            seen.push(parent_id);
            current = state.categories.get(&parent_id).and_then(|c| c.parent);
        }

        category.version += 1;
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }
}
