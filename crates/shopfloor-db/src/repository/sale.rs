//! # Sale Repository
//!
//! The tenant's sales journal. Every sale made during a session is recorded
//! here, tagged with the session id; at logout the journal rows of the
//! session become the lines of its report.
//!
//! ## Recording a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE products SET stock = stock - qty                              │
//! │      WHERE id = ? AND stock >= qty        ── 0 rows? → rollback        │
//! │    INSERT INTO sales (...)                                              │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Stock is only decremented, never written absolutely, so concurrent
//! restocking through the product resolver is preserved.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use shopfloor_core::{Money, SaleRecord};

const SALE_COLUMNS: &str = r#"
    id, session_id, staff_id, product_id, product_name,
    quantity, unit_price_cents, line_total_cents, sold_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    session_id: String,
    staff_id: String,
    product_id: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
    sold_at: DateTime<Utc>,
}

impl From<SaleRow> for SaleRecord {
    fn from(row: SaleRow) -> Self {
        SaleRecord {
            id: row.id,
            session_id: row.session_id,
            staff_id: row.staff_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            line_total: Money::from_cents(row.line_total_cents),
            sold_at: row.sold_at,
        }
    }
}

/// Repository for the sales journal.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale and takes its units out of stock, atomically.
    ///
    /// ## Returns
    /// * `Ok(())` - Sale recorded, stock decremented
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    /// * `Err(DbError::InsufficientStock)` - Not enough units on hand
    pub async fn record(&self, sale: &SaleRecord) -> DbResult<()> {
        debug!(
            sale_id = %sale.id,
            session_id = %sale.session_id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            "Recording sale"
        );

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(&sale.product_id)
        .bind(sale.quantity)
        .bind(sale.sold_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                    .bind(&sale.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match available {
                None => DbError::not_found("Product", &sale.product_id),
                Some(available) => DbError::InsufficientStock {
                    product_id: sale.product_id.clone(),
                    requested: sale.quantity,
                    available,
                },
            });
        }

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, session_id, staff_id, product_id, product_name,
                quantity, unit_price_cents, line_total_cents, sold_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.session_id)
        .bind(&sale.staff_id)
        .bind(&sale.product_id)
        .bind(&sale.product_name)
        .bind(sale.quantity)
        .bind(sale.unit_price.cents())
        .bind(sale.line_total.cents())
        .bind(sale.sold_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists the sales of one session in the order they were made.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<SaleRecord>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE session_id = ?1 ORDER BY rowid"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRecord::from).collect())
    }

    /// Lists a staff member's sales, newest first.
    pub async fn list_for_staff(&self, staff_id: &str, limit: u32) -> DbResult<Vec<SaleRecord>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE staff_id = ?1 ORDER BY rowid DESC LIMIT ?2"
        ))
        .bind(staff_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRecord::from).collect())
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
    use shopfloor_core::identity::new_product;
    use shopfloor_core::{ProductCategory, ProposedProduct};

    fn sale_of(product_id: &str, session_id: &str, quantity: i64) -> SaleRecord {
        let unit_price = Money::from_cents(500);
        SaleRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            staff_id: "staff-1".to_string(),
            product_id: product_id.to_string(),
            product_name: "Coil X".to_string(),
            quantity,
            unit_price,
            line_total: unit_price.multiply_quantity(quantity),
            sold_at: Utc::now(),
        }
    }

    async fn stocked(db: &crate::Database, stock: i64) -> String {
        let proposal = ProposedProduct::new("Coil X", "B", ProductCategory::Coil, Money::from_cents(500))
            .with_quantity(stock);
        let product = new_product(&proposal, Utc::now());
        db.products().insert(&product).await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn test_record_decrements_stock() {
        let db = memory_db(Schema::Tenant).await;
        let product_id = stocked(&db, 10).await;

        db.sales().record(&sale_of(&product_id, "s-1", 3)).await.unwrap();
        db.sales().record(&sale_of(&product_id, "s-1", 2)).await.unwrap();

        let product = db.products().get(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);

        let sales = db.sales().list_for_session("s-1").await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].quantity, 3);
        assert_eq!(sales[1].line_total, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_nothing_behind() {
        let db = memory_db(Schema::Tenant).await;
        let product_id = stocked(&db, 2).await;

        let err = db.sales().record(&sale_of(&product_id, "s-1", 3)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock { requested: 3, available: 2, .. }
        ));

        assert!(db.sales().list_for_session("s-1").await.unwrap().is_empty());
        let product = db.products().get(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = memory_db(Schema::Tenant).await;
        let err = db.sales().record(&sale_of("missing", "s-1", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sessions_are_kept_apart() {
        let db = memory_db(Schema::Tenant).await;
        let product_id = stocked(&db, 10).await;

        db.sales().record(&sale_of(&product_id, "s-1", 1)).await.unwrap();
        db.sales().record(&sale_of(&product_id, "s-2", 1)).await.unwrap();

        assert_eq!(db.sales().list_for_session("s-1").await.unwrap().len(), 1);
        assert_eq!(db.sales().list_for_staff("staff-1", 10).await.unwrap().len(), 2);
    }
}
