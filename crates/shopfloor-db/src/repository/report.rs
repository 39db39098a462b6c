//! # Report Repository
//!
//! Persisted session reports and their reconciliation state.
//!
//! ## Deposit Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reader A: cash = 10.00          Reader B: cash = 10.00                │
//! │  A: UPDATE ... SET cash = 25.00  WHERE id = ? AND cash = 10.00  → 1 row│
//! │  B: UPDATE ... SET cash = 20.00  WHERE id = ? AND cash = 10.00  → 0 row│
//! │                                                          └─► conflict  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The conditional write keeps `cash_submitted` monotonic even when two
//! operators reconcile the same report at once.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use shopfloor_core::{Money, SessionReport, SoldLine};

const REPORT_COLUMNS: &str = r#"
    id, staff_id, staff_name, tenant_id, started_at, ended_at,
    total_items, total_amount_cents, cash_submitted_cents, settled_at
"#;

/// Default page size for report listings.
pub const DEFAULT_REPORT_LIMIT: u32 = 100;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: String,
    staff_id: String,
    staff_name: String,
    tenant_id: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    total_items: i64,
    total_amount_cents: i64,
    cash_submitted_cents: i64,
    settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    product_id: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<LineRow> for SoldLine {
    fn from(row: LineRow) -> Self {
        SoldLine {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            line_total: Money::from_cents(row.line_total_cents),
        }
    }
}

impl ReportRow {
    fn into_report(self, lines: Vec<SoldLine>) -> SessionReport {
        SessionReport {
            id: self.id,
            staff_id: self.staff_id,
            staff_name: self.staff_name,
            tenant_id: self.tenant_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            lines,
            total_items: self.total_items,
            total_amount: Money::from_cents(self.total_amount_cents),
            cash_submitted: Money::from_cents(self.cash_submitted_cents),
            settled_at: self.settled_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for session reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Persists a freshly closed report with its lines.
    pub async fn insert(&self, report: &SessionReport) -> DbResult<()> {
        debug!(
            report_id = %report.id,
            lines = report.lines.len(),
            total = %report.total_amount,
            "Inserting session report"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO session_reports (
                id, staff_id, staff_name, tenant_id, started_at, ended_at,
                total_items, total_amount_cents, cash_submitted_cents, settled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&report.id)
        .bind(&report.staff_id)
        .bind(&report.staff_name)
        .bind(&report.tenant_id)
        .bind(report.started_at)
        .bind(report.ended_at)
        .bind(report.total_items)
        .bind(report.total_amount.cents())
        .bind(report.cash_submitted.cents())
        .bind(report.settled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(&report.id))?;

        for (line_no, line) in report.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO session_report_lines (
                    report_id, line_no, product_id, product_name,
                    quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&report.id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(report_id = %report.id, total = %report.total_amount, "Session report stored");
        Ok(())
    }

    /// Gets a report with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<SessionReport>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM session_reports WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines_of(&row.id).await?;
                Ok(Some(row.into_report(lines)))
            }
            None => Ok(None),
        }
    }

    async fn lines_of(&self, report_id: &str) -> DbResult<Vec<SoldLine>> {
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT product_id, product_name, quantity, unit_price_cents, line_total_cents
            FROM session_report_lines
            WHERE report_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SoldLine::from).collect())
    }

    async fn with_lines(&self, rows: Vec<ReportRow>) -> DbResult<Vec<SessionReport>> {
        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines_of(&row.id).await?;
            reports.push(row.into_report(lines));
        }
        Ok(reports)
    }

    /// Lists reports, most recently closed first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<SessionReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM session_reports ORDER BY ended_at DESC, rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(rows).await
    }

    /// Lists one staff member's reports, most recently closed first.
    pub async fn list_for_staff(&self, staff_id: &str, limit: u32) -> DbResult<Vec<SessionReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM session_reports
            WHERE staff_id = ?1
            ORDER BY ended_at DESC, rowid DESC
            LIMIT ?2
            "#
        ))
        .bind(staff_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(rows).await
    }

    /// Lists reports that still have cash outstanding.
    pub async fn list_unsettled(&self, limit: u32) -> DbResult<Vec<SessionReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM session_reports
            WHERE settled_at IS NULL
            ORDER BY ended_at DESC, rowid DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(rows).await
    }

    /// Writes a new cumulative cash figure if the stored one is still
    /// `expected`.
    ///
    /// `settled_at` is only ever set, never cleared, by this write.
    ///
    /// ## Returns
    /// * `Ok(true)` - Written
    /// * `Ok(false)` - The stored figure moved (or the report is gone)
    pub async fn update_cash(
        &self,
        id: &str,
        expected: Money,
        new_total: Money,
        settled_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        debug!(report_id = %id, from = %expected, to = %new_total, "Updating cash submitted");

        let result = sqlx::query(
            r#"
            UPDATE session_reports
            SET cash_submitted_cents = ?3,
                settled_at = COALESCE(settled_at, ?4)
            WHERE id = ?1 AND cash_submitted_cents = ?2
            "#,
        )
        .bind(id)
        .bind(expected.cents())
        .bind(new_total.cents())
        .bind(settled_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Permanently deletes a report and its lines, settled or not.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_report_lines WHERE report_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM session_reports WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SessionReport", id));
        }

        tx.commit().await?;

        info!(report_id = %id, "Session report deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
