//! # Database Pool Management
//!
//! Connection pool creation and configuration for a single SQLite store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Store, One Pool                                │
//! │                                                                         │
//! │  ConnectionRouter (router.rs)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) / DbConfig::shared_memory(name)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::open(config).await ← Create pool + run migrations           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ Database is Clone; every clone shares the same pool            │
//! │       ▼                                                                 │
//! │  Request 1 ──► db.products()                                           │
//! │  Request 2 ──► db.reports()                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File-backed stores use SQLite WAL (Write-Ahead Logging) mode:
//! - Readers don't block writers
//! - Writers don't block readers
//! - Better crash recovery
//!
//! ## Shared In-Memory Stores
//! Tests and throwaway deployments use named shared-cache in-memory stores.
//! The store lives as long as one connection to it stays open, so the pool
//! keeps exactly one connection and never reaps it.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, Schema};
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::staff::StaffRepository;
use crate::repository::tenant::TenantRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where a store's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFile {
    /// A SQLite file on disk.
    Path(PathBuf),
    /// A named shared-cache in-memory database.
    Memory(String),
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/shopfloor/shop_a.db")
///     .schema(Schema::Tenant)
///     .max_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Name used in logs and in errors. Usually the store name.
    pub name: String,

    /// Where the store lives.
    pub file: StoreFile,

    /// Which migrations to apply.
    pub schema: Schema,

    /// Maximum number of connections in the pool.
    /// Default: 5. Forced to 1 for in-memory stores.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a connection from the pool.
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes. Ignored for in-memory stores.
    pub idle_timeout: Duration,

    /// Whether to run migrations on open.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for a store file. The file is created on
    /// first open; its directory must already exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        DbConfig::with_file(name, StoreFile::Path(path))
    }

    /// Creates a configuration for a named shared-cache in-memory store.
    ///
    /// Every pool opened under the same name in this process sees the same
    /// data while at least one of them is open.
    pub fn shared_memory(name: impl Into<String>) -> Self {
        let name = name.into();
        DbConfig::with_file(name.clone(), StoreFile::Memory(name))
    }

    fn with_file(name: String, file: StoreFile) -> Self {
        DbConfig {
            name,
            file,
            schema: Schema::Tenant,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets which schema the store carries.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    #[inline]
    fn is_memory(&self) -> bool {
        matches!(self.file, StoreFile::Memory(_))
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.file {
            StoreFile::Path(path) => {
                let url = format!("sqlite://{}?mode=rwc", path.display());
                SqliteConnectOptions::from_str(&url)
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .create_if_missing(true)
            }
            StoreFile::Memory(name) => {
                let url = format!("sqlite://{}?mode=memory&cache=shared", name);
                SqliteConnectOptions::from_str(&url)
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            }
        };

        // SQLite has foreign keys disabled by default for backwards compatibility
        Ok(options.foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to one open store, providing repository access.
///
/// Cheap to clone. Clones share the pool, so closing any clone closes them
/// all; only the router should do that.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Store name, for logs.
    name: String,

    schema: Schema,
}

impl Database {
    /// Opens a store and returns a ready handle.
    ///
    /// ## What This Does
    /// 1. Creates the store file if it doesn't exist
    /// 2. Configures SQLite (WAL for files, foreign keys always)
    /// 3. Creates the connection pool
    /// 4. Runs the schema's migrations (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        info!(
            store = %config.name,
            file = ?config.file,
            schema = ?config.schema,
            "Opening store"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let pool_options = if config.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            store = %config.name,
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            name: config.name,
            schema: config.schema,
        };

        if config.run_migrations {
            if let Err(e) = db.run_migrations().await {
                db.pool.close().await;
                return Err(e);
            }
        }

        Ok(db)
    }

    /// Runs this store's migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool, self.schema).await
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the store name this handle was opened for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns which schema this store carries.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Whether the pool is still usable. False once any clone was closed.
    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Returns the tenant registry. Only meaningful on the control plane.
    pub fn tenants(&self) -> TenantRepository {
        TenantRepository::new(self.pool.clone(), self.name.clone())
    }

    /// Returns the product repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let products = db.products().list(&ProductFilter::default()).await?;
    /// ```
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the staff repository.
    pub fn staff(&self) -> StaffRepository {
        StaffRepository::new(self.pool.clone())
    }

    /// Returns the sales journal repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Returns the session report repository.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes the connection pool.
    ///
    /// ## Note
    /// After calling close, every clone of this handle fails its queries
    /// and reports `is_connected() == false`.
    pub async fn close(&self) {
        info!(store = %self.name, "Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
