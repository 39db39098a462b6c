//! # shopfloor-service: Back-Office Services
//!
//! Session tracking, product resolution and cash reconciliation on top of
//! the tenant stores handed out by [`shopfloor_db::ConnectionRouter`].
//!
//! ## Module Organization
//!
//! - [`backoffice`] - Facade wiring the services to the router
//! - [`session`] - Live sessions and their conversion into reports
//! - [`catalog`] - Deduplicating "add product" and catalog edits
//! - [`ledger`] - Cumulative cash deposits against reports
//! - [`config`] - TOML + environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Service error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopfloor_db::ConnectionRouter;
//! use shopfloor_service::{Backoffice, BackofficeConfig};
//!
//! let config = BackofficeConfig::load(None)?;
//! let router = Arc::new(ConnectionRouter::new(config.router_config()));
//! let backoffice = Backoffice::new(router);
//!
//! let session = backoffice.login(&caller).await?;
//! backoffice.record_sale(&caller, &session.id, &product_id, 1).await?;
//! let report = backoffice.logout(&session.id).await?;
//! ```

pub mod backoffice;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod session;
pub mod telemetry;

pub use backoffice::Backoffice;
pub use catalog::{ProductResolver, Resolution};
pub use config::BackofficeConfig;
pub use error::{ServiceError, ServiceResult};
pub use session::{InMemorySessionStore, SessionStore, SessionTracker};
