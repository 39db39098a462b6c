//! # shopfloor-core: Pure Business Logic for the Shopfloor Back Office
//!
//! This crate holds every rule of the back office that can be expressed
//! without touching a database, a socket, or a clock owned by someone else.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Shopfloor Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 shopfloor-service                               │   │
//! │  │   login ──► record sale ──► logout ──► deposit                  │   │
//! │  │   add product (resolve)                                         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shopfloor-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌──────────────┐  ┌──────────┐ │   │
//! │  │   │   types   │  │   money   │  │   identity   │  │reconcile │ │   │
//! │  │   │  Product  │  │   Money   │  │  MatchKey    │  │ deposits │ │   │
//! │  │   │  Report   │  │           │  │  scan codes  │  │ settling │ │   │
//! │  │   └───────────┘  └───────────┘  └──────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 shopfloor-db (Database Layer)                   │   │
//! │  │       tenant router, migrations, repositories                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Tenant, Product, Session, SessionReport, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`identity`] - Product match keys and stock/scan-code merging
//! - [`reconciliation`] - Cash deposit rules for closed session reports
//!
//! ## Example Usage
//!
//! ```rust
//! use shopfloor_core::identity::MatchKey;
//! use shopfloor_core::{Money, ProductCategory, ProposedProduct};
//!
//! let a = ProposedProduct::new("Coil X", "B", ProductCategory::Coil, Money::from_cents(500));
//! let b = ProposedProduct::new("  coil x ", "b", ProductCategory::Coil, Money::from_cents(500));
//!
//! // Name and brand compare case-insensitively after trimming
//! assert_eq!(MatchKey::of_proposal(&a), MatchKey::of_proposal(&b));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod money;
pub mod reconciliation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default name of the control-plane store.
///
/// Tenant stores may never use this name.
pub const DEFAULT_CONTROL_STORE: &str = "control_plane";

/// Maximum length of a tenant store name (it becomes a file name).
pub const MAX_STORE_NAME_LEN: usize = 64;

/// Maximum length of a single scan code.
pub const MAX_SCAN_CODE_LEN: usize = 64;

/// Ceiling for stock levels and for the units moved by a single operation.
pub const MAX_QUANTITY: i64 = 1_000_000_000;
