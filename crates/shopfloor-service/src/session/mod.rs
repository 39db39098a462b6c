//! # Session Tracking
//!
//! Live selling sessions, from login to logout.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open() ──► ACTIVE ──── record_sale() ───┐                             │
//! │                │  ▲                       │  counters += amount         │
//! │                │  └───────────────────────┘                             │
//! │                │                                                        │
//! │             close() ──► report built, session removed (terminal)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions live only in the [`SessionStore`]; they never expire on their
//! own and do not survive a restart.

pub mod store;
pub mod tracker;

pub use store::{InMemorySessionStore, SessionStore};
pub use tracker::SessionTracker;
