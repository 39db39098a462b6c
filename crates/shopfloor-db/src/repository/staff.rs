//! # Staff Repository
//!
//! Staff accounts of one tenant. Usernames are unique per tenant store.
//! No credentials are stored here; the authentication service owns them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use shopfloor_core::validation::validate_username;
use shopfloor_core::{Staff, StaffRole};

const STAFF_COLUMNS: &str = "id, username, display_name, role, is_active, created_at";

/// Repository for staff accounts.
#[derive(Debug, Clone)]
pub struct StaffRepository {
    pool: SqlitePool,
}

impl StaffRepository {
    /// Creates a new StaffRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StaffRepository { pool }
    }

    /// Creates a staff account.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Username already taken in this tenant
    pub async fn create(
        &self,
        username: &str,
        display_name: &str,
        role: StaffRole,
    ) -> DbResult<Staff> {
        validate_username(username)?;

        let username = username.trim().to_string();
        let display_name = match display_name.trim() {
            "" => username.clone(),
            name => name.to_string(),
        };

        let staff = Staff {
            id: Uuid::new_v4().to_string(),
            username,
            display_name,
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO staff (id, username, display_name, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&staff.id)
        .bind(&staff.username)
        .bind(&staff.display_name)
        .bind(staff.role)
        .bind(staff.is_active)
        .bind(staff.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(&staff.username))?;

        info!(staff_id = %staff.id, username = %staff.username, role = %staff.role, "Staff created");
        Ok(staff)
    }

    /// Gets a staff account by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff)
    }

    /// Gets a staff account by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE username = ?1"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff)
    }

    /// Lists staff, optionally only one role, newest first.
    pub async fn list(&self, role: Option<StaffRole>) -> DbResult<Vec<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE (?1 IS NULL OR role = ?1) ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(staff)
    }

    /// Changes display name and role.
    pub async fn update(&self, id: &str, display_name: &str, role: StaffRole) -> DbResult<()> {
        debug!(staff_id = %id, role = %role, "Updating staff");

        let result = sqlx::query("UPDATE staff SET display_name = ?2, role = ?3 WHERE id = ?1")
            .bind(id)
            .bind(display_name.trim())
            .bind(role)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Staff", id));
        }

        Ok(())
    }

    /// Activates or deactivates an account.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE staff SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Staff", id));
        }

        Ok(())
    }

    /// Deletes an account. Reports keep the staff name they were closed with.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM staff WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Staff", id));
        }

        info!(staff_id = %id, "Staff deleted");
        Ok(())
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

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.staff();

        let staff = repo.create(" ayesha ", "Ayesha K", StaffRole::Shopkeeper).await.unwrap();
        assert_eq!(staff.username, "ayesha");

        let by_name = repo.get_by_username("ayesha").await.unwrap().unwrap();
        assert_eq!(by_name, staff);
        assert_eq!(repo.get(&staff.id).await.unwrap().unwrap().role, StaffRole::Shopkeeper);
    }

    #[tokio::test]
    async fn test_username_unique() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.staff();

        repo.create("sam", "", StaffRole::Manager).await.unwrap();
        let err = repo.create("sam", "Other Sam", StaffRole::Shopkeeper).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_list_by_role_and_update() {
        let db = memory_db(Schema::Tenant).await;
        let repo = db.staff();

        let a = repo.create("a", "A", StaffRole::Shopkeeper).await.unwrap();
        repo.create("b", "B", StaffRole::Manager).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        assert_eq!(repo.list(Some(StaffRole::Manager)).await.unwrap().len(), 1);

        repo.update(&a.id, "A Senior", StaffRole::Manager).await.unwrap();
        repo.set_active(&a.id, false).await.unwrap();
        let a = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(a.display_name, "A Senior");
        assert!(!a.is_active);

        repo.delete(&a.id).await.unwrap();
        assert!(matches!(repo.delete(&a.id).await, Err(DbError::NotFound { .. })));
    }
}
