//! PostgreSQL catalog store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use catalog::{
    AssignedOption, Category, CatalogError, CatalogStore, DeliveryOption, DeliveryOptionId,
    FinanceOption, FinanceOptionId, MAX_ANCESTOR_DEPTH, Product, ProductId, ProductSku, SkuId,
    StockDecrement, Variety, VarietyAssignment, VarietyOption, VarietyOptionId, Voucher,
    error::Result,
};
use catalog::CategoryId;
use sqlx::{PgPool, Row};

/// Postgres error code for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres error code for foreign-key violations.
const FK_VIOLATION: &str = "23503";

fn storage(err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(err.to_string())
}

fn doc_err(err: serde_json::Error) -> CatalogError {
    CatalogError::Storage(err.to_string())
}

fn is_pg_error(err: &sqlx::Error, code: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|c| c == code)
        .unwrap_or(false)
}

fn from_doc<T: serde::de::DeserializeOwned>(doc: serde_json::Value) -> Result<T> {
    serde_json::from_value(doc).map_err(doc_err)
}

fn to_doc<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(doc_err)
}

/// PostgreSQL-backed catalog store.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_doc<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        id: uuid::Uuid,
    ) -> Result<Option<T>> {
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| {
            let doc: serde_json::Value = r.try_get("doc").map_err(storage)?;
            from_doc(doc)
        })
        .transpose()
    }

    /// Validates a SKU's option combination against the product's other
    /// enabled SKUs (one option per variety, same variety set, unique
    /// combination).
    async fn validate_sku(&self, sku: &ProductSku) -> Result<()> {
        let mut varieties = BTreeSet::new();
        for option_id in &sku.options {
            let option: VarietyOption = self
                .fetch_doc("SELECT doc FROM variety_options WHERE id = $1", option_id.as_uuid())
                .await?
                .ok_or_else(|| CatalogError::NotFound {
                    entity: "variety option",
                    id: option_id.to_string(),
                })?;
            if !varieties.insert(option.variety) {
                return Err(CatalogError::SkuVarietyMismatch);
            }
        }

        let rows = sqlx::query("SELECT doc FROM skus WHERE product_id = $1 AND enabled AND id <> $2")
            .bind(sku.product.as_uuid())
            .bind(sku.id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        for row in rows {
            let existing: ProductSku = from_doc(row.try_get("doc").map_err(storage)?)?;
            if sku.enabled && existing.options == sku.options {
                return Err(CatalogError::DuplicateSkuCombination);
            }
            let mut existing_varieties = BTreeSet::new();
            for option_id in &existing.options {
                if let Some(option) = self
                    .fetch_doc::<VarietyOption>(
                        "SELECT doc FROM variety_options WHERE id = $1",
                        option_id.as_uuid(),
                    )
                    .await?
                {
                    existing_varieties.insert(option.variety);
                }
            }
            if existing_varieties != varieties {
                return Err(CatalogError::SkuVarietyMismatch);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        self.fetch_doc("SELECT doc FROM products WHERE id = $1", id.as_uuid())
            .await
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT doc FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .transpose()
    }

    async fn save_product(&self, mut product: Product) -> Result<Product> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM products WHERE id = $1 FOR UPDATE")
                .bind(product.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;
        if let Some(actual) = current
            && actual as u64 != product.version
        {
            return Err(CatalogError::VersionConflict {
                entity: "product",
                expected: product.version,
                actual: actual as u64,
            });
        }

        product.version += 1;
        let doc = to_doc(&product)?;
        let result = sqlx::query(
            "INSERT INTO products (id, slug, version, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET slug = $2, version = $3, doc = $4",
        )
        .bind(product.id.as_uuid())
        .bind(&product.slug)
        .bind(product.version as i64)
        .bind(&doc)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if is_pg_error(&err, UNIQUE_VIOLATION) => {
                return Err(CatalogError::DuplicateSlug {
                    slug: product.slug.clone(),
                });
            }
            Err(err) => return Err(storage(err)),
        }

        tx.commit().await.map_err(storage)?;
        Ok(product)
    }

    async fn assigned_options(&self, product: ProductId) -> Result<Vec<AssignedOption>> {
        let rows = sqlx::query(
            "SELECT a.doc AS assignment, o.doc AS option, v.doc AS variety
             FROM variety_assignments a
             JOIN variety_options o ON o.id = a.option_id
             JOIN varieties v ON v.id = o.variety_id
             WHERE a.product_id = $1 AND o.enabled",
        )
        .bind(product.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut assigned = Vec::with_capacity(rows.len());
        for row in rows {
            let assignment: VarietyAssignment = from_doc(row.try_get("assignment").map_err(storage)?)?;
            let option: VarietyOption = from_doc(row.try_get("option").map_err(storage)?)?;
            let variety: Variety = from_doc(row.try_get("variety").map_err(storage)?)?;
            assigned.push(AssignedOption {
                variety,
                option,
                offset_override: assignment.offset_override,
            });
        }
        assigned.sort_by_key(|a| (a.variety.seq, a.variety.id, a.option.seq, a.option.id));
        Ok(assigned)
    }

    async fn save_variety(&self, variety: Variety) -> Result<()> {
        let doc = to_doc(&variety)?;
        sqlx::query(
            "INSERT INTO varieties (id, slug, doc) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET slug = $2, doc = $3",
        )
        .bind(variety.id.as_uuid())
        .bind(&variety.slug)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_pg_error(&err, UNIQUE_VIOLATION) {
                CatalogError::DuplicateSlug {
                    slug: variety.slug.clone(),
                }
            } else {
                storage(err)
            }
        })?;
        Ok(())
    }

    async fn save_variety_option(&self, option: VarietyOption) -> Result<()> {
        let doc = to_doc(&option)?;
        sqlx::query(
            "INSERT INTO variety_options (id, variety_id, enabled, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET variety_id = $2, enabled = $3, doc = $4",
        )
        .bind(option.id.as_uuid())
        .bind(option.variety.as_uuid())
        .bind(option.enabled)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_pg_error(&err, FK_VIOLATION) {
                CatalogError::NotFound {
                    entity: "variety",
                    id: option.variety.to_string(),
                }
            } else {
                storage(err)
            }
        })?;
        Ok(())
    }

    async fn delete_variety_option(&self, id: VarietyOptionId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Deleting an option deletes every SKU referencing it; option ids
        // are stored as JSON strings inside the SKU document.
        sqlx::query("DELETE FROM skus WHERE doc->'options' @> to_jsonb(ARRAY[$1::text])")
            .bind(id.as_uuid().to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        // Assignments cascade via the foreign key.
        sqlx::query("DELETE FROM variety_options WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn save_assignment(&self, assignment: VarietyAssignment) -> Result<()> {
        let doc = to_doc(&assignment)?;
        sqlx::query(
            "INSERT INTO variety_assignments (product_id, option_id, doc) VALUES ($1, $2, $3)
             ON CONFLICT (product_id, option_id) DO UPDATE SET doc = $3",
        )
        .bind(assignment.product.as_uuid())
        .bind(assignment.option.as_uuid())
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_pg_error(&err, FK_VIOLATION) {
                CatalogError::NotFound {
                    entity: "variety option",
                    id: assignment.option.to_string(),
                }
            } else {
                storage(err)
            }
        })?;
        Ok(())
    }

    async fn sku(&self, id: SkuId) -> Result<Option<ProductSku>> {
        self.fetch_doc("SELECT doc FROM skus WHERE id = $1", id.as_uuid())
            .await
    }

    async fn find_sku(
        &self,
        product: ProductId,
        options: &BTreeSet<VarietyOptionId>,
    ) -> Result<Option<ProductSku>> {
        let rows = sqlx::query("SELECT doc FROM skus WHERE product_id = $1 AND enabled")
            .bind(product.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        for row in rows {
            let sku: ProductSku = from_doc(row.try_get("doc").map_err(storage)?)?;
            if sku.matches(options) {
                return Ok(Some(sku));
            }
        }
        Ok(None)
    }

    async fn save_sku(&self, sku: ProductSku) -> Result<()> {
        self.validate_sku(&sku).await?;
        let doc = to_doc(&sku)?;
        sqlx::query(
            "INSERT INTO skus (id, product_id, enabled, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET product_id = $2, enabled = $3, doc = $4",
        )
        .bind(sku.id.as_uuid())
        .bind(sku.product.as_uuid())
        .bind(sku.enabled)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn decrement_product_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let row = sqlx::query("SELECT doc FROM products WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| CatalogError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;
        let mut product: Product = from_doc(row.try_get("doc").map_err(storage)?)?;

        let requested = i64::from(quantity);
        let applied = requested.min(product.stocklevel).max(0);
        product.stocklevel -= applied;

        sqlx::query("UPDATE products SET doc = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(to_doc(&product)?)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(StockDecrement {
            requested,
            applied,
            remaining: product.stocklevel,
        })
    }

    async fn decrement_sku_stock(&self, id: SkuId, quantity: u32) -> Result<StockDecrement> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let row = sqlx::query("SELECT doc FROM skus WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| CatalogError::NotFound {
                entity: "SKU",
                id: id.to_string(),
            })?;
        let mut sku: ProductSku = from_doc(row.try_get("doc").map_err(storage)?)?;

        let requested = i64::from(quantity);
        let applied = requested.min(sku.stocklevel).max(0);
        sku.stocklevel -= applied;

        sqlx::query("UPDATE skus SET doc = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(to_doc(&sku)?)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(StockDecrement {
            requested,
            applied,
            remaining: sku.stocklevel,
        })
    }

    async fn delivery_option(&self, id: DeliveryOptionId) -> Result<Option<DeliveryOption>> {
        self.fetch_doc("SELECT doc FROM delivery_options WHERE id = $1", id.as_uuid())
            .await
    }

    async fn delivery_options(&self) -> Result<Vec<DeliveryOption>> {
        let rows = sqlx::query("SELECT doc FROM delivery_options WHERE enabled ORDER BY seq, id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.into_iter()
            .map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .collect()
    }

    async fn save_delivery_option(&self, option: DeliveryOption) -> Result<()> {
        let doc = to_doc(&option)?;
        sqlx::query(
            "INSERT INTO delivery_options (id, enabled, seq, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET enabled = $2, seq = $3, doc = $4",
        )
        .bind(option.id.as_uuid())
        .bind(option.enabled)
        .bind(option.seq)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        let normalised = Voucher::normalise_code(code);
        let row = sqlx::query("SELECT doc FROM vouchers WHERE code = $1")
            .bind(&normalised)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .transpose()
    }

    async fn save_voucher(&self, voucher: Voucher) -> Result<()> {
        let doc = to_doc(&voucher)?;
        sqlx::query(
            "INSERT INTO vouchers (id, code, doc) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET code = $2, doc = $3",
        )
        .bind(voucher.id.as_uuid())
        .bind(&voucher.code)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn finance_option(&self, id: FinanceOptionId) -> Result<Option<FinanceOption>> {
        self.fetch_doc("SELECT doc FROM finance_options WHERE id = $1", id.as_uuid())
            .await
    }

    async fn save_finance_option(&self, option: FinanceOption) -> Result<()> {
        let doc = to_doc(&option)?;
        sqlx::query(
            "INSERT INTO finance_options (id, doc) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET doc = $2",
        )
        .bind(option.id.as_uuid())
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.fetch_doc("SELECT doc FROM categories WHERE id = $1", id.as_uuid())
            .await
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT doc FROM categories ORDER BY seq, id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.into_iter()
            .map(|r| from_doc(r.try_get("doc").map_err(storage)?))
            .collect()
    }

    async fn category_path(&self, id: CategoryId) -> Result<Vec<Category>> {
        let start: Category = self
            .category(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                entity: "category",
                id: id.to_string(),
            })?;

        let mut path = vec![start];
        loop {
            let Some(parent_id) = path.last().and_then(|c| c.parent) else {
                break;
            };
            if path.len() > MAX_ANCESTOR_DEPTH || path.iter().any(|c| c.id == parent_id) {
                return Err(CatalogError::CategoryCycle);
            }
            let parent = self
                .category(parent_id)
                .await?
                .ok_or_else(|| CatalogError::NotFound {
                    entity: "category",
                    id: parent_id.to_string(),
                })?;
            path.push(parent);
        }
        path.reverse();
        Ok(path)
    }

    async fn save_category(&self, mut category: Category) -> Result<Category> {
        // Walk the would-be ancestor chain before writing.
        let mut seen = vec![category.id];
        let mut current = category.parent;
        while let Some(parent_id) = current {
            if seen.len() > MAX_ANCESTOR_DEPTH || seen.contains(&parent_id) {
                return Err(CatalogError::CategoryCycle);
            }
            seen.push(parent_id);
            current = self.category(parent_id).await?.and_then(|c| c.parent);
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM categories WHERE id = $1 FOR UPDATE")
                .bind(category.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;
        if let Some(actual) = actual
            && actual as u64 != category.version
        {
            return Err(CatalogError::VersionConflict {
                entity: "category",
                expected: category.version,
                actual: actual as u64,
            });
        }

        category.version += 1;
        let doc = to_doc(&category)?;
        let result = sqlx::query(
            "INSERT INTO categories (id, slug, seq, version, doc) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET slug = $2, seq = $3, version = $4, doc = $5",
        )
        .bind(category.id.as_uuid())
        .bind(&category.slug)
        .bind(category.seq)
        .bind(category.version as i64)
        .bind(&doc)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if is_pg_error(&err, UNIQUE_VIOLATION) => {
                return Err(CatalogError::DuplicateSlug {
                    slug: category.slug.clone(),
                });
            }
            Err(err) => return Err(storage(err)),
        }

        tx.commit().await.map_err(storage)?;
        Ok(category)
    }
}
