//! # Service Error Types
//!
//! Errors surfaced by the back-office services.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Wrapped       │  │   Conflicts     │  │     Sessions / Config   │ │
//! │  │                 │  │   (retryable)   │  │                         │ │
//! │  │  Router         │  │  ResolveConflict│  │  SessionNotFound        │ │
//! │  │  Db             │  │  DepositConflict│  │  Config                 │ │
//! │  │  Core           │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use shopfloor_core::{CoreError, ValidationError};
use shopfloor_db::{DbError, RouterError};
use thiserror::Error;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by the session tracker, resolver, ledger and facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// The tenant store could not be reached.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A repository call failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Sessions
    // =========================================================================
    /// No live session with this id (never opened, or already closed).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // =========================================================================
    // Conflicts
    // =========================================================================
    /// Another writer created the same product first. Re-resolving merges
    /// into the winner.
    #[error("Concurrent add of product '{match_key}' in store '{store_name}'")]
    ResolveConflict {
        store_name: String,
        match_key: String,
    },

    /// The report's cash figure moved between read and write.
    #[error("Report {report_id} was updated concurrently")]
    DepositConflict { report_id: String },

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::ResolveConflict { .. } | ServiceError::DepositConflict { .. } => true,
            ServiceError::Router(RouterError::Connection { .. }) => true,
            ServiceError::Db(DbError::ConnectionFailed(_) | DbError::PoolExhausted) => true,
            _ => false,
        }
    }

    /// Whether the error means "no such thing" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::SessionNotFound(_)
                | ServiceError::Db(DbError::NotFound { .. })
                | ServiceError::Router(RouterError::TenantNotFound(_))
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
