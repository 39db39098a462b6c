//! # Tenant Connection Router
//!
//! Maps a store name to a live [`Database`] handle, opening each store at
//! most once per process and replacing handles that went dead.
//!
//! ## Create-or-Wait
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  slots: Mutex<HashMap<store_name, Arc<Mutex<Option<Database>>>>>        │
//! │                                                                         │
//! │  request "shop_a" ──► lock map ──► get or insert slot ──► unlock map    │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                                        lock slot                        │
//! │                          ┌───────────────────┼───────────────────┐      │
//! │                          ▼                   ▼                   ▼      │
//! │                   Some(connected)      Some(closed)            None     │
//! │                   return clone         warn, reopen           open      │
//! │                                                                         │
//! │  A second request for "shop_a" waits on the slot lock and gets the     │
//! │  handle the first one opened. Requests for other stores only share     │
//! │  the map lock, which is never held across I/O.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure
//! Opening is bounded by `connect_timeout`. A failed or timed-out open leaves
//! the slot empty, so nothing broken is cached and the next request simply
//! tries again.
//!
//! ## Ownership
//! Callers get clones of the handle. Only [`ConnectionRouter::close_all`]
//! closes pools, at shutdown.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DbError, RouterError, RouterResult};
use crate::migrations::Schema;
use crate::pool::{Database, DbConfig};
use shopfloor_core::validation::{check_store_name_shape, validate_store_name};
use shopfloor_core::DEFAULT_CONTROL_STORE;

// =============================================================================
// Configuration
// =============================================================================

/// Where the router keeps its stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// One `{store_name}.db` file per store in this directory. The directory
    /// must exist.
    Directory(PathBuf),
    /// Named shared-cache in-memory stores. The namespace keeps routers in
    /// the same process apart.
    Memory { namespace: String },
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub location: StoreLocation,

    /// Store name reserved for the control plane.
    pub control_store: String,

    /// Per-store pool size.
    pub max_connections: u32,

    /// Upper bound on opening one store, migrations included.
    pub connect_timeout: Duration,

    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
}

impl RouterConfig {
    /// Stores as files under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        RouterConfig {
            location: StoreLocation::Directory(data_dir.into()),
            control_store: DEFAULT_CONTROL_STORE.to_string(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
        }
    }

    /// Stores in memory, under a fresh namespace.
    pub fn in_memory() -> Self {
        RouterConfig {
            location: StoreLocation::Memory {
                namespace: uuid::Uuid::new_v4().simple().to_string(),
            },
            ..RouterConfig::new(".")
        }
    }

    pub fn control_store(mut self, name: impl Into<String>) -> Self {
        self.control_store = name.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn db_config(&self, store_name: &str, schema: Schema) -> DbConfig {
        let base = match &self.location {
            StoreLocation::Directory(dir) => DbConfig::new(dir.join(format!("{store_name}.db"))),
            StoreLocation::Memory { namespace } => {
                DbConfig::shared_memory(format!("{namespace}-{store_name}"))
            }
        };

        base.name(store_name)
            .schema(schema)
            .max_connections(self.max_connections)
            .connect_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

// =============================================================================
// Router
// =============================================================================

type Slot = Arc<Mutex<Option<Database>>>;

/// Hands out one shared handle per store.
///
/// Create one per process and share it behind an `Arc`.
///
/// ## Example
/// ```rust,ignore
/// let router = Arc::new(ConnectionRouter::new(RouterConfig::new("./data")));
///
/// let control = router.control_plane().await?;
/// let shop = router.connection_for("shop_a").await?;
/// let same = router.connection_for_tenant(&tenant_id).await?;
/// ```
#[derive(Debug)]
pub struct ConnectionRouter {
    config: RouterConfig,
    slots: Mutex<HashMap<String, Slot>>,
    established: AtomicU64,
    failed: AtomicU64,
}

impl ConnectionRouter {
    /// Creates a router. Nothing is opened until first use.
    pub fn new(config: RouterConfig) -> Self {
        ConnectionRouter {
            config,
            slots: Mutex::new(HashMap::new()),
            established: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Returns the router's configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Returns the handle for a tenant store, opening it on first use.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Live handle, shared with every other caller
    /// * `Err(RouterError::InvalidStoreName)` - Malformed or reserved name
    /// * `Err(RouterError::Connection)` - The store could not be opened
    pub async fn connection_for(&self, store_name: &str) -> RouterResult<Database> {
        validate_store_name(store_name, &self.config.control_store)?;
        self.connect(store_name, Schema::Tenant).await
    }

    /// Returns the control-plane handle, opening it on first use.
    pub async fn control_plane(&self) -> RouterResult<Database> {
        check_store_name_shape(&self.config.control_store)?;
        self.connect(&self.config.control_store, Schema::Control).await
    }

    /// Resolves a tenant id through the control plane and returns the
    /// handle for its store.
    pub async fn connection_for_tenant(&self, tenant_id: &str) -> RouterResult<Database> {
        let control = self.control_plane().await?;
        let tenant = control
            .tenants()
            .get(tenant_id)
            .await?
            .ok_or_else(|| RouterError::TenantNotFound(tenant_id.to_string()))?;

        self.connection_for(&tenant.store_name).await
    }

    async fn slot(&self, store_name: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(store_name.to_string()).or_default().clone()
    }

    async fn connect(&self, store_name: &str, schema: Schema) -> RouterResult<Database> {
        let slot = self.slot(store_name).await;
        let mut cached = slot.lock().await;

        if let Some(db) = cached.as_ref() {
            if db.is_connected() {
                debug!(store_name = %store_name, "Reusing cached connection");
                return Ok(db.clone());
            }
            warn!(store_name = %store_name, "Cached connection is closed, re-establishing");
            *cached = None;
        }

        let config = self.config.db_config(store_name, schema);
        let timeout = self.config.connect_timeout;

        let opened = match tokio::time::timeout(timeout, Database::open(config)).await {
            Ok(result) => result,
            Err(_) => Err(DbError::ConnectionFailed(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        };

        match opened {
            Ok(db) => {
                self.established.fetch_add(1, Ordering::Relaxed);
                info!(store_name = %store_name, ?schema, "Store connection established");
                *cached = Some(db.clone());
                Ok(db)
            }
            Err(source) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(store_name = %store_name, error = %source, "Store connection failed");
                Err(RouterError::Connection {
                    store_name: store_name.to_string(),
                    source,
                })
            }
        }
    }

    /// Number of store connections opened so far, re-establishments included.
    pub fn established_count(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }

    /// Number of failed attempts to open a store.
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Names of stores that currently hold a handle, sorted.
    pub async fn cached_store_names(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = {
            let slots = self.slots.lock().await;
            slots.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut names = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            if slot.lock().await.is_some() {
                names.push(name);
            }
        }
        names.sort();
        names
    }

    /// Closes every cached store. Intended for shutdown.
    ///
    /// Later requests open stores afresh.
    pub async fn close_all(&self) {
        let slots: Vec<(String, Slot)> = {
            let mut slots = self.slots.lock().await;
            slots.drain().collect()
        };

        info!(count = slots.len(), "Closing all store connections");

        for (name, slot) in slots {
            if let Some(db) = slot.lock().await.take() {
                debug!(store_name = %name, "Closing store");
                db.close().await;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
