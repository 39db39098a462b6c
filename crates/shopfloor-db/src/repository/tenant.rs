//! # Tenant Repository
//!
//! The control-plane registry of retail outlets.
//!
//! ## Store Name Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create("shop_a")                                                       │
//! │     ├── live tenant already has it?   → UniqueViolation                 │
//! │     ├── retired_store_names has it?   → UniqueViolation                 │
//! │     └── insert tenant                                                   │
//! │                                                                         │
//! │  delete(tenant)                                                         │
//! │     └── move store_name to retired_store_names (same transaction)      │
//! │                                                                         │
//! │  A store name is immutable and is never handed out twice.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use shopfloor_core::validation::validate_store_name;
use shopfloor_core::{NewTenant, Tenant, ValidationError};

const TENANT_COLUMNS: &str = "id, name, store_name, location, is_active, created_at, updated_at";

/// Repository for the tenant registry.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
    /// Name of the control-plane store, reserved from tenant use.
    control_store: String,
}

impl TenantRepository {
    /// Creates a new TenantRepository.
    pub fn new(pool: SqlitePool, control_store: impl Into<String>) -> Self {
        TenantRepository {
            pool,
            control_store: control_store.into(),
        }
    }

    /// Registers a tenant.
    ///
    /// ## Returns
    /// * `Ok(Tenant)` - The registered tenant
    /// * `Err(DbError::Validation)` - Bad name or store name
    /// * `Err(DbError::UniqueViolation)` - Store name live or retired
    pub async fn create(&self, new: &NewTenant) -> DbResult<Tenant> {
        if new.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }
        validate_store_name(&new.store_name, &self.control_store)?;

        let mut tx = self.pool.begin().await?;

        let retired: Option<String> =
            sqlx::query_scalar("SELECT store_name FROM retired_store_names WHERE store_name = ?1")
                .bind(&new.store_name)
                .fetch_optional(&mut *tx)
                .await?;
        if retired.is_some() {
            return Err(DbError::duplicate("store_name", &new.store_name));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            store_name: new.store_name.clone(),
            location: new.location.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, store_name, location, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.store_name)
        .bind(&tenant.location)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(&tenant.store_name))?;

        tx.commit().await?;

        info!(tenant_id = %tenant.id, store_name = %tenant.store_name, "Tenant registered");
        Ok(tenant)
    }

    /// Gets a tenant by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Gets a tenant by its store name.
    pub async fn get_by_store_name(&self, store_name: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE store_name = ?1"
        ))
        .bind(store_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Lists all tenants ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY name, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = tenants.len(), "Listed tenants");
        Ok(tenants)
    }

    /// Lists active tenants ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE is_active = 1 ORDER BY name, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }

    /// Updates the display name and location. The store name never changes.
    pub async fn update_details(&self, id: &str, name: &str, location: &str) -> DbResult<Tenant> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE tenants SET name = ?2, location = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(name.trim())
        .bind(location.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    /// Activates or deactivates a tenant.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(tenant_id = %id, active, "Setting tenant active flag");

        let result = sqlx::query("UPDATE tenants SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }

        Ok(())
    }

    /// Deletes a tenant and retires its store name.
    ///
    /// The tenant's store itself is left on disk.
    pub async fn delete(&self, id: &str) -> DbResult<Tenant> {
        let mut tx = self.pool.begin().await?;

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Tenant", id))?;

        sqlx::query("DELETE FROM tenants WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO retired_store_names (store_name, tenant_id, retired_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&tenant.store_name)
        .bind(&tenant.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(tenant_id = %id, store_name = %tenant.store_name, "Tenant deleted, store name retired");
        Ok(tenant)
    }

    /// Checks whether a store name was ever used by a deleted tenant.
    pub async fn is_retired(&self, store_name: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM retired_store_names WHERE store_name = ?1")
                .bind(store_name)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::migrations::Schema;
    use crate::pool::tests::memory_db;
    use shopfloor_core::NewTenant;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = memory_db(Schema::Control).await;
        let repo = db.tenants();

        let tenant = repo
            .create(&NewTenant::new("Downtown", "downtown").with_location("Main St"))
            .await
            .unwrap();

        let fetched = repo.get(&tenant.id).await.unwrap().unwrap();
        assert_eq!(fetched, tenant);
        assert_eq!(fetched.location, "Main St");
        assert!(fetched.is_active);

        let by_store = repo.get_by_store_name("downtown").await.unwrap().unwrap();
        assert_eq!(by_store.id, tenant.id);
    }

    #[tokio::test]
    async fn test_duplicate_store_name_rejected() {
        let db = memory_db(Schema::Control).await;
        let repo = db.tenants();

        repo.create(&NewTenant::new("A", "shop_a")).await.unwrap();
        let err = repo.create(&NewTenant::new("B", "shop_a")).await.unwrap_err();
        match err {
            DbError::UniqueViolation { value, .. } => assert_eq!(value, "shop_a"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deleted_store_name_is_never_reused() {
        let db = memory_db(Schema::Control).await;
        let repo = db.tenants();

        let tenant = repo.create(&NewTenant::new("A", "shop_a")).await.unwrap();
        repo.delete(&tenant.id).await.unwrap();

        assert!(repo.get(&tenant.id).await.unwrap().is_none());
        assert!(repo.is_retired("shop_a").await.unwrap());

        let err = repo.create(&NewTenant::new("A again", "shop_a")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_invalid_and_reserved_store_names() {
        let db = memory_db(Schema::Control).await;
        let repo = db.tenants();

        let err = repo.create(&NewTenant::new("A", "Shop A")).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        // The control plane repository reserves its own store name
        let reserved = db.name().to_string();
        let err = repo.create(&NewTenant::new("A", reserved)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_and_deactivate() {
        let db = memory_db(Schema::Control).await;
        let repo = db.tenants();

        let b = repo.create(&NewTenant::new("Bravo", "bravo")).await.unwrap();
        repo.create(&NewTenant::new("Alpha", "alpha")).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Alpha", "Bravo"]);

        repo.set_active(&b.id, false).await.unwrap();
        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Alpha");

        let renamed = repo.update_details(&b.id, "Bravo 2", "Harbour").await.unwrap();
        assert_eq!(renamed.store_name, "bravo");
        assert_eq!(renamed.location, "Harbour");
    }

    #[tokio::test]
    async fn test_delete_unknown_tenant() {
        let db = memory_db(Schema::Control).await;
        let err = db.tenants().delete("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
