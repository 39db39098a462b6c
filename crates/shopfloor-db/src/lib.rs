//! # shopfloor-db: Database Layer for the Shopfloor Back Office
//!
//! Every tenant owns an isolated SQLite store; a control-plane store lists
//! the tenants. This crate opens those stores, routes requests to them and
//! holds all the SQL.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopfloor Data Flow                              │
//! │                                                                         │
//! │  shopfloor-service (login, sale, logout, add product, deposit)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   shopfloor-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Connection    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ Router        │───►│  tenant       │    │  control/    │  │   │
//! │  │   │ (router.rs)   │    │  product      │    │  tenant/     │  │   │
//! │  │   │               │    │  staff, sale  │    │              │  │   │
//! │  │   │ Database      │    │  report       │    │              │  │   │
//! │  │   │ (pool.rs)     │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  {data_dir}/control_plane.db   {data_dir}/shop_a.db   ...       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`router`] - Store name → shared, health-checked connection handle
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded migrations for both schemas
//! - [`error`] - Database and routing error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopfloor_db::{ConnectionRouter, RouterConfig};
//!
//! let router = ConnectionRouter::new(RouterConfig::new("./data"));
//!
//! let shop = router.connection_for("shop_a").await?;
//! let products = shop.products().list(&Default::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod router;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, RouterError, RouterResult};
pub use migrations::Schema;
pub use pool::{Database, DbConfig, StoreFile};
pub use router::{ConnectionRouter, RouterConfig, StoreLocation};

// Repository re-exports for convenience
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::staff::StaffRepository;
pub use repository::tenant::TenantRepository;
