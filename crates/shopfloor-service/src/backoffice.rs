//! # Back Office
//!
//! The tenant-scoped operations, wired together.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CallerIdentity (from the authentication service)                      │
//! │       │  tenant_id                                                      │
//! │       ▼                                                                 │
//! │  ConnectionRouter::connection_for_tenant ──► tenant Database            │
//! │       │                                                                 │
//! │       ├── login ──────► SessionTracker::open                            │
//! │       ├── record_sale ► SaleRepository::record, then count on session   │
//! │       ├── logout ─────► take session ► journal lines ► store report     │
//! │       ├── add_product ► ProductResolver::resolve                        │
//! │       └── deposit ────► ledger::deposit                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use shopfloor_core::validation::validate_sale_quantity;
use shopfloor_core::{
    CallerIdentity, Money, NewTenant, ProposedProduct, SaleRecord, Session, SessionReport, Tenant,
    ValidationError,
};
use shopfloor_db::{ConnectionRouter, Database, DbError};

use crate::catalog::{ProductResolver, Resolution};
use crate::error::{ServiceError, ServiceResult};
use crate::ledger;
use crate::session::SessionTracker;

/// Shared service state. One per process, behind an `Arc`.
#[derive(Debug)]
pub struct Backoffice {
    router: Arc<ConnectionRouter>,
    tracker: SessionTracker,
    resolver: ProductResolver,
}

impl Backoffice {
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self::with_tracker(router, SessionTracker::in_memory())
    }

    pub fn with_tracker(router: Arc<ConnectionRouter>, tracker: SessionTracker) -> Self {
        Backoffice {
            router,
            tracker,
            resolver: ProductResolver::new(),
        }
    }

    pub fn router(&self) -> &Arc<ConnectionRouter> {
        &self.router
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn resolver(&self) -> &ProductResolver {
        &self.resolver
    }

    /// The store of a tenant, by tenant id.
    pub async fn store_for(&self, tenant_id: &str) -> ServiceResult<Database> {
        Ok(self.router.connection_for_tenant(tenant_id).await?)
    }

    // =========================================================================
    // Tenants
    // =========================================================================

    /// Registers a tenant and creates its store.
    pub async fn register_tenant(&self, new: &NewTenant) -> ServiceResult<Tenant> {
        let control = self.router.control_plane().await?;
        let tenant = control.tenants().create(new).await?;

        // Open once so the schema exists before the first request.
        self.router.connection_for(&tenant.store_name).await?;

        info!(tenant_id = %tenant.id, store_name = %tenant.store_name, "Tenant registered");
        Ok(tenant)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Opens a session for an authenticated caller.
    pub async fn login(&self, caller: &CallerIdentity) -> ServiceResult<Session> {
        // Routing first: an unknown tenant gets no session.
        self.store_for(&caller.tenant_id).await?;

        self.tracker
            .open(&caller.staff_id, &caller.display_name, &caller.tenant_id)
            .await
    }

    /// Sells `quantity` units of a product within a session.
    ///
    /// The sale and its stock decrement are committed even when the session
    /// is no longer live; it then simply is not counted on any session. A
    /// live session of another tenant is treated as unknown.
    pub async fn record_sale(
        &self,
        caller: &CallerIdentity,
        session_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<SaleRecord> {
        validate_sale_quantity(quantity)?;

        match self.tracker.get(session_id).await {
            Ok(session) if session.tenant_id != caller.tenant_id => {
                warn!(
                    session_id = %session_id,
                    tenant_id = %caller.tenant_id,
                    "Sale against another tenant's session refused"
                );
                return Err(ServiceError::SessionNotFound(session_id.to_string()));
            }
            Ok(_) | Err(ServiceError::SessionNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let db = self.store_for(&caller.tenant_id).await?;
        let product = db
            .products()
            .get(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let line_total = product
            .price
            .checked_multiply_quantity(quantity)
            .ok_or_else(|| ValidationError::TooLarge {
                field: "line_total_cents".to_string(),
                max: i64::MAX,
            })?;

        let sale = SaleRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            staff_id: caller.staff_id.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            line_total,
            sold_at: Utc::now(),
        };
        db.sales().record(&sale).await?;

        self.tracker.record_sale(session_id, sale.line_total).await;
        Ok(sale)
    }

    /// Closes a session into a report and stores the report.
    ///
    /// The session leaves the live set before the sales journal is read, so
    /// racing logouts yield one report. If the report cannot be built or
    /// stored the session is put back and the logout can be retried.
    pub async fn logout(&self, session_id: &str) -> ServiceResult<SessionReport> {
        let tenant_id = self.tracker.get(session_id).await?.tenant_id;
        let db = self.store_for(&tenant_id).await?;

        let session = self.tracker.take(session_id).await?;

        match self.store_report(&db, session.clone()).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to store session report; session kept open"
                );
                if let Err(restore_err) = self.tracker.restore(session).await {
                    warn!(session_id = %session_id, error = %restore_err, "Failed to restore session");
                }
                Err(e)
            }
        }
    }

    /// Reads the session's lines from the journal and stores its report.
    async fn store_report(&self, db: &Database, session: Session) -> ServiceResult<SessionReport> {
        let lines: Vec<_> = db
            .sales()
            .list_for_session(&session.id)
            .await?
            .iter()
            .map(SaleRecord::to_line)
            .collect();

        lines
            .iter()
            .try_fold(Money::zero(), |total, line| total.checked_add(line.line_total))
            .ok_or_else(|| ValidationError::TooLarge {
                field: "total_amount_cents".to_string(),
                max: i64::MAX,
            })?;

        let report = self.tracker.report_for(session, lines);
        db.reports().insert(&report).await?;
        Ok(report)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Adds stock through the product resolver.
    ///
    /// A lost creation race is re-resolved once, which then merges into the
    /// product the other writer created.
    pub async fn add_product(
        &self,
        tenant_id: &str,
        proposal: &ProposedProduct,
    ) -> ServiceResult<Resolution> {
        let db = self.store_for(tenant_id).await?;

        match self.resolver.resolve(&db, db.name(), proposal).await {
            Err(ServiceError::ResolveConflict { match_key, .. }) => {
                info!(store_name = %db.name(), match_key = %match_key, "Re-resolving after conflict");
                self.resolver.resolve(&db, db.name(), proposal).await
            }
            other => other,
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    pub async fn deposit(
        &self,
        tenant_id: &str,
        report_id: &str,
        new_total: Money,
    ) -> ServiceResult<SessionReport> {
        let db = self.store_for(tenant_id).await?;
        ledger::deposit(&db, report_id, new_total).await
    }

    pub async fn report(&self, tenant_id: &str, report_id: &str) -> ServiceResult<SessionReport> {
        let db = self.store_for(tenant_id).await?;
        ledger::get(&db, report_id).await
    }

    pub async fn reports(&self, tenant_id: &str, limit: u32) -> ServiceResult<Vec<SessionReport>> {
        let db = self.store_for(tenant_id).await?;
        ledger::list(&db, limit).await
    }

    pub async fn delete_report(&self, tenant_id: &str, report_id: &str) -> ServiceResult<()> {
        let db = self.store_for(tenant_id).await?;
        ledger::delete(&db, report_id).await?;
        info!(tenant_id = %tenant_id, report_id = %report_id, "Report deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
