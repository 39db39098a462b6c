//! # Error Types
//!
//! Domain-specific error types for shopfloor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopfloor-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopfloor-db errors (separate crate)                                  │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── RouterError      - Store connection failures                      │
//! │                                                                         │
//! │  shopfloor-service errors                                              │
//! │  └── ServiceError     - What callers of the back office see            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cash deposit was rejected.
    ///
    /// ## When This Occurs
    /// - The new cumulative figure is lower than what was already submitted
    /// - The new cumulative figure exceeds the report total
    ///
    /// The error carries the rejected value and the range that would have
    /// been accepted so the operator can correct the entry.
    #[error(
        "Invalid deposit for report {report_id}: {rejected} is outside the accepted range {min}..={max}"
    )]
    InvalidDeposit {
        report_id: String,
        rejected: Money,
        min: Money,
        max: Money,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any store is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is below zero.
    #[error("{field} cannot be negative")]
    MustBeNonNegative { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is above its ceiling (or would overflow).
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: i64 },

    /// Invalid format (e.g., invalid UUID, bad store name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Value already exists (or existed) and may not be reused.
    #[error("{field} '{value}' is already taken")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_deposit_message_names_range() {
        let err = CoreError::InvalidDeposit {
            report_id: "r-1".to_string(),
            rejected: Money::from_cents(3000),
            min: Money::from_cents(1000),
            max: Money::from_cents(2500),
        };
        assert_eq!(
            err.to_string(),
            "Invalid deposit for report r-1: 30.00 is outside the accepted range 10.00..=25.00"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::MustBeNonNegative {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity cannot be negative");

        let err = ValidationError::TooLarge {
            field: "stock".to_string(),
            max: 1_000,
        };
        assert_eq!(err.to_string(), "stock must be at most 1000");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "store_name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
