//! # Database Migrations
//!
//! Embedded SQL migrations for the two kinds of store.
//!
//! ## Two Schemas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Schema per Store Kind                              │
//! │                                                                         │
//! │  control_plane.db  ◄── migrations/control/                             │
//! │    tenants, retired_store_names                                         │
//! │                                                                         │
//! │  {store_name}.db   ◄── migrations/tenant/      (one file per tenant)    │
//! │    products, staff, sales, session_reports, session_report_lines       │
//! │                                                                         │
//! │  Each store runs its own migrations the first time the router opens    │
//! │  it; `_sqlx_migrations` in that store records what was applied.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/control/` or `migrations/tenant/`
//! 2. Name format: `NNNN_description.sql` (e.g., `0002_add_discounts.sql`)
//! 3. **NEVER** modify existing migrations - always add new ones
//!
//! Tenant migrations run lazily, so a tenant that has not been opened since
//! a release still carries the old schema until its next connection.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Control-plane migrations, embedded at compile time.
static CONTROL_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/control");

/// Tenant store migrations, embedded at compile time.
static TENANT_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/tenant");

/// Which schema a store carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// The shared store listing tenants.
    Control,
    /// A single tenant's catalog, staff, sales and reports.
    Tenant,
}

impl Schema {
    fn migrator(&self) -> &'static Migrator {
        match self {
            Schema::Control => &CONTROL_MIGRATOR,
            Schema::Tenant => &TENANT_MIGRATOR,
        }
    }
}

/// Runs all pending migrations of `schema` against `pool`.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Transactional: each migration runs in a transaction
/// - Ordered: migrations run in filename order (0001, 0002, ...)
pub async fn run_migrations(pool: &SqlitePool, schema: Schema) -> DbResult<()> {
    info!(?schema, "Checking for pending migrations");

    schema.migrator().run(pool).await?;

    info!(?schema, "All migrations applied successfully");
    Ok(())
}

/// Returns information about migrations.
///
/// ## Returns
/// Tuple of (total_migrations, applied_migrations)
pub async fn migration_status(pool: &SqlitePool, schema: Schema) -> DbResult<(usize, usize)> {
    let total = schema.migrator().migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
