//! # Product Repository
//!
//! Catalog persistence for one tenant store.
//!
//! ## Key Operations
//! - Lookup by match key (identity resolution) and by scan code
//! - Insert of new entries, merge of matching ones
//! - Direct edits, listing with filters, deletion
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                                                               │
//! │  ───────────────────────────────────────────────────────────────────    │
//! │  id │ name   │ ... │ stock │ scan_code │ scan_codes    │ match_key      │
//! │  p1 │ Coil X │ ... │  15   │ C2        │ ["C1","C2"]   │ coil x␟b␟…     │
//! │                                                       ▲                 │
//! │                                        UNIQUE index ──┘                 │
//! │                                                                         │
//! │  scan_codes is a JSON array; lookups by code go through json_each.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use shopfloor_core::identity::MatchKey;
use shopfloor_core::{Money, Product, ProductCategory};

const PRODUCT_COLUMNS: &str = r#"
    id, name, brand, category, flavour, ml_capacity,
    price_cents, cost_cents, stock, scan_code, scan_codes,
    note, image_ref, created_at, updated_at
"#;

/// Default page size for [`ProductRepository::list`].
pub const DEFAULT_LIST_LIMIT: u32 = 200;

// =============================================================================
// Row Mapping
// =============================================================================

/// A products row as stored. `scan_codes` is still JSON text here.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    brand: String,
    category: ProductCategory,
    flavour: String,
    ml_capacity: i64,
    price_cents: i64,
    cost_cents: i64,
    stock: i64,
    scan_code: String,
    scan_codes: String,
    note: String,
    image_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let scan_codes: Vec<String> = serde_json::from_str(&row.scan_codes)?;
        Ok(Product {
            id: row.id,
            name: row.name,
            brand: row.brand,
            category: row.category,
            flavour: row.flavour,
            ml_capacity: row.ml_capacity,
            price: Money::from_cents(row.price_cents),
            cost: Money::from_cents(row.cost_cents),
            stock: row.stock,
            scan_code: row.scan_code,
            scan_codes,
            note: row.note,
            image_ref: row.image_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

// =============================================================================
// Filters
// =============================================================================

/// Filter for listing the catalog.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    /// Only this category.
    pub category: Option<ProductCategory>,
    /// Case-insensitive substring of name or brand.
    pub query: Option<String>,
    pub limit: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter {
            category: None,
            query: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let existing = repo.find_by_match_key(&MatchKey::of_proposal(&proposal)).await?;
/// let by_code = repo.find_by_scan_code("8901234567890").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Finds the product stored under a match key.
    pub async fn find_by_match_key(&self, key: &MatchKey) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE match_key = ?1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Finds a product by scan code, checking both the legacy primary code
    /// and the scan-code set.
    pub async fn find_by_scan_code(&self, code: &str) -> DbResult<Option<Product>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        debug!(code = %code, "Looking up product by scan code");

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE scan_code = ?1
               OR EXISTS (SELECT 1 FROM json_each(products.scan_codes) WHERE json_each.value = ?1)
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists products, newest first.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let pattern = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.to_lowercase()));

        debug!(category = ?filter.category, query = ?pattern, limit = filter.limit, "Listing products");

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR lower(name) LIKE ?2 OR lower(brand) LIKE ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#
        ))
        .bind(filter.category)
        .bind(pattern)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    /// Inserts a new product under its match key.
    ///
    /// ## Returns
    /// * `Ok(())` - Inserted
    /// * `Err(DbError::UniqueViolation)` - Another product already holds the key
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        let key = MatchKey::of_product(product);
        debug!(id = %product.id, match_key = %key, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, brand, category, flavour, ml_capacity,
                price_cents, cost_cents, stock, scan_code, scan_codes,
                note, image_ref, match_key, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.category)
        .bind(&product.flavour)
        .bind(product.ml_capacity)
        .bind(product.price.cents())
        .bind(product.cost.cents())
        .bind(product.stock)
        .bind(&product.scan_code)
        .bind(serde_json::to_string(&product.scan_codes)?)
        .bind(&product.note)
        .bind(&product.image_ref)
        .bind(key.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(&key.to_string()))?;

        Ok(())
    }

    /// Writes a merge result back.
    ///
    /// Stock moves by `quantity_delta` relative to what is stored, not to
    /// what `merged` holds, so a concurrent sale is never overwritten. The
    /// other merged fields are written as given.
    pub async fn apply_merge(&self, merged: &Product, quantity_delta: i64) -> DbResult<()> {
        debug!(id = %merged.id, delta = quantity_delta, "Merging into product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock = stock + ?2,
                scan_code = ?3,
                scan_codes = ?4,
                note = ?5,
                image_ref = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&merged.id)
        .bind(quantity_delta)
        .bind(&merged.scan_code)
        .bind(serde_json::to_string(&merged.scan_codes)?)
        .bind(&merged.note)
        .bind(&merged.image_ref)
        .bind(merged.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &merged.id));
        }

        Ok(())
    }

    /// Overwrites the fields of a product, recomputing its match key.
    ///
    /// Stock is only written when `set_stock` is true; otherwise the stored
    /// level is kept, so sales and merges landing meanwhile are not undone.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - The edit moved the product onto
    ///   another product's identity
    pub async fn update(&self, product: &Product, set_stock: bool) -> DbResult<()> {
        let key = MatchKey::of_product(product);
        debug!(id = %product.id, match_key = %key, set_stock, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                brand = ?3,
                category = ?4,
                flavour = ?5,
                ml_capacity = ?6,
                price_cents = ?7,
                cost_cents = ?8,
                stock = COALESCE(?9, stock),
                scan_code = ?10,
                scan_codes = ?11,
                note = ?12,
                image_ref = ?13,
                match_key = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.category)
        .bind(&product.flavour)
        .bind(product.ml_capacity)
        .bind(product.price.cents())
        .bind(product.cost.cents())
        .bind(set_stock.then_some(product.stock))
        .bind(&product.scan_code)
        .bind(serde_json::to_string(&product.scan_codes)?)
        .bind(&product.note)
        .bind(&product.image_ref)
        .bind(key.as_str())
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(&key.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Permanently deletes a product. Past sales keep its name.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::Schema;
    use crate::pool::tests::memory_db;
    use shopfloor_core::identity::{merge_into, new_product};
    use shopfloor_core::ProposedProduct;

    fn coil() -> ProposedProduct {
        ProposedProduct::new("Coil X", "Brand", ProductCategory::Coil, Money::from_cents(500))
            .with_quantity(10)
            .with_scan_code("C1")
    }

    #[tokio::test]
    async fn test_insert_and_find_by_match_key() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        let product = new_product(&coil(), Utc::now());
        repo.insert(&product).await.unwrap();

        let found = repo
            .find_by_match_key(&MatchKey::of_proposal(&coil()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, product.id);
        assert_eq!(found.scan_codes, vec!["C1"]);
        assert_eq!(found.price, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_duplicate_match_key_rejected() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        repo.insert(&new_product(&coil(), Utc::now())).await.unwrap();
        let err = repo
            .insert(&new_product(&coil(), Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_merge_is_relative() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        let mut product = new_product(&coil(), Utc::now());
        repo.insert(&product).await.unwrap();

        let extra = coil().with_quantity(5).with_scan_code("C2");
        merge_into(&mut product, &extra, Utc::now()).unwrap();

        // Someone else took 3 units meanwhile
        sqlx::query("UPDATE products SET stock = stock - 3 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        repo.apply_merge(&product, extra.quantity).await.unwrap();

        let stored = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 12);
        assert_eq!(stored.scan_codes, vec!["C1", "C2"]);
        assert_eq!(stored.scan_code, "C2");
    }

    #[tokio::test]
    async fn test_find_by_scan_code() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        let mut product = new_product(&coil(), Utc::now());
        product.scan_codes.push("C7".to_string());
        product.scan_code = "LEGACY".to_string();
        repo.insert(&product).await.unwrap();

        for code in ["C1", "C7", "LEGACY", " C7 "] {
            let found = repo.find_by_scan_code(code).await.unwrap();
            assert_eq!(found.map(|p| p.id), Some(product.id.clone()), "code {code}");
        }
        assert!(repo.find_by_scan_code("C9").await.unwrap().is_none());
        assert!(repo.find_by_scan_code("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        repo.insert(&new_product(&coil(), Utc::now())).await.unwrap();
        let pod = ProposedProduct::new("Xros Pod", "Vaporesso", ProductCategory::Device, Money::from_cents(3000));
        repo.insert(&new_product(&pod, Utc::now())).await.unwrap();

        let all = repo.list(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Xros Pod");

        let devices = repo
            .list(&ProductFilter {
                category: Some(ProductCategory::Device),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);

        let by_brand = repo
            .list(&ProductFilter {
                query: Some("VAPOR".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_brand.len(), 1);
        assert_eq!(by_brand[0].brand, "Vaporesso");
    }

    #[tokio::test]
    async fn test_update_onto_existing_identity_conflicts() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        repo.insert(&new_product(&coil(), Utc::now())).await.unwrap();
        let mut dearer = new_product(
            &ProposedProduct::new("Coil X", "Brand", ProductCategory::Coil, Money::from_cents(600)),
            Utc::now(),
        );
        repo.insert(&dearer).await.unwrap();

        dearer.price = Money::from_cents(500);
        let err = repo.update(&dearer, false).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_keeps_stock_unless_asked() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        let mut product = new_product(&coil(), Utc::now());
        repo.insert(&product).await.unwrap();

        // Stock moves after the snapshot was taken
        repo.apply_merge(&product, 5).await.unwrap();

        product.note = "0.8 ohm".to_string();
        product.stock = 0;
        repo.update(&product, false).await.unwrap();

        let stored = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 15);
        assert_eq!(stored.note, "0.8 ohm");

        product.stock = 3;
        repo.update(&product, true).await.unwrap();
        assert_eq!(repo.get(&product.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.products();

        let product = new_product(&coil(), Utc::now());
        repo.insert(&product).await.unwrap();
        repo.delete(&product.id).await.unwrap();

        assert!(repo.get(&product.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
