//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service layer                                                         │
//! │       │                                                                 │
//! │       │  router.connection_for("shop_a").await?.products().get(id)     │
//! │       ▼                                                                 │
//! │  ProductRepository (one store's pool)                                  │
//! │  ├── find_by_match_key / find_by_scan_code                             │
//! │  ├── insert / apply_merge / update                                     │
//! │  └── list / delete                                                     │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite store of that tenant                                           │
//! │                                                                         │
//! │  Repositories never pick a store themselves: they are always created   │
//! │  from a Database handle the router gave out.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`](tenant::TenantRepository) - Control-plane tenant registry
//! - [`ProductRepository`](product::ProductRepository) - Catalog persistence
//! - [`StaffRepository`](staff::StaffRepository) - Staff accounts per tenant
//! - [`SaleRepository`](sale::SaleRepository) - Sales journal
//! - [`ReportRepository`](report::ReportRepository) - Session reports and deposits

pub mod product;
pub mod report;
pub mod sale;
pub mod staff;
pub mod tenant;
