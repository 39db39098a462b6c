//! # Validation Module
//!
//! Input validation for the back office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP layer, not part of this workspace)              │
//! │  └── Deserialization into typed requests                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Store names (they become file names)                              │
//! │  ├── Product proposals before identity resolution                      │
//! │  └── Sale quantities and staff usernames                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE store_name, username, match_key                            │
//! │  └── CHECK / NOT NULL constraints                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shopfloor_core::validation::{validate_store_name, validate_sale_quantity};
//!
//! validate_store_name("downtown_01", "control_plane").unwrap();
//! validate_sale_quantity(2).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{ProductEdit, ProposedProduct};
use crate::{MAX_QUANTITY, MAX_SCAN_CODE_LEN, MAX_STORE_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_PRODUCT_NAME_LEN: usize = 200;
const MAX_BRAND_LEN: usize = 100;
const MAX_USERNAME_LEN: usize = 50;

// =============================================================================
// Identifiers
// =============================================================================

/// Validates a tenant store name.
///
/// ## Rules
/// - 1 to 64 characters
/// - Only lowercase ASCII letters, digits, `_` and `-`
/// - Must not equal the control-plane store name
///
/// ## Example
/// ```rust
/// use shopfloor_core::validation::validate_store_name;
///
/// assert!(validate_store_name("shop_a", "control_plane").is_ok());
/// assert!(validate_store_name("../etc", "control_plane").is_err());
/// assert!(validate_store_name("control_plane", "control_plane").is_err());
/// ```
pub fn validate_store_name(name: &str, control_store: &str) -> ValidationResult<()> {
    check_store_name_shape(name)?;

    if name == control_store {
        return Err(ValidationError::InvalidFormat {
            field: "store_name".to_string(),
            reason: format!("'{}' is reserved for the control plane", control_store),
        });
    }

    Ok(())
}

/// Validates only the shape of a store name, without the reserved-name rule.
///
/// Used for the control-plane name itself.
pub fn check_store_name_shape(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "store_name".to_string(),
        });
    }

    if name.len() > MAX_STORE_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "store_name".to_string(),
            max: MAX_STORE_NAME_LEN,
        });
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "store_name".to_string(),
            reason: "only a-z, 0-9, '_' and '-' are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates a staff username.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Product Fields
// =============================================================================

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use shopfloor_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Caliburn G2").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > MAX_PRODUCT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_PRODUCT_NAME_LEN,
        });
    }

    Ok(())
}

fn validate_brand(brand: &str) -> ValidationResult<()> {
    if brand.trim().len() > MAX_BRAND_LEN {
        return Err(ValidationError::TooLong {
            field: "brand".to_string(),
            max: MAX_BRAND_LEN,
        });
    }
    Ok(())
}

/// Validates a scan code. Empty codes are allowed and mean "none".
pub fn validate_scan_code(code: &str) -> ValidationResult<()> {
    if code.trim().len() > MAX_SCAN_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "scan_code".to_string(),
            max: MAX_SCAN_CODE_LEN,
        });
    }
    Ok(())
}

/// Validates a monetary amount that may be zero but not negative.
pub fn validate_non_negative_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// A unit count between zero and [`MAX_QUANTITY`].
fn validate_quantity(field: &str, value: i64) -> ValidationResult<()> {
    validate_non_negative(field, value)?;
    if value > MAX_QUANTITY {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an "add product" request before resolution.
///
/// ## Rules
/// - name required, at most 200 characters
/// - price, cost and quantity must not be negative
/// - quantity at most [`MAX_QUANTITY`]
/// - scan code at most 64 characters
pub fn validate_proposal(proposal: &ProposedProduct) -> ValidationResult<()> {
    validate_product_name(&proposal.name)?;
    validate_brand(&proposal.brand)?;
    validate_non_negative_money("price", proposal.price)?;
    validate_non_negative_money("cost", proposal.cost)?;
    validate_quantity("quantity", proposal.quantity)?;
    validate_non_negative("ml_capacity", proposal.ml_capacity)?;
    if let Some(code) = &proposal.scan_code {
        validate_scan_code(code)?;
    }
    Ok(())
}

/// Validates the fields present in a direct product edit.
pub fn validate_edit(edit: &ProductEdit) -> ValidationResult<()> {
    if let Some(name) = &edit.name {
        validate_product_name(name)?;
    }
    if let Some(brand) = &edit.brand {
        validate_brand(brand)?;
    }
    if let Some(price) = edit.price {
        validate_non_negative_money("price", price)?;
    }
    if let Some(cost) = edit.cost {
        validate_non_negative_money("cost", cost)?;
    }
    if let Some(stock) = edit.stock {
        validate_quantity("stock", stock)?;
    }
    if let Some(ml) = edit.ml_capacity {
        validate_non_negative("ml_capacity", ml)?;
    }
    if let Some(code) = &edit.scan_code {
        validate_scan_code(code)?;
    }
    Ok(())
}

// =============================================================================
// Sales
// =============================================================================

/// Validates the quantity of a single sale: at least one, at most
/// [`MAX_QUANTITY`].
pub fn validate_sale_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    validate_quantity("quantity", qty)
}

// =============================================================================
// Unit Tests
// =============================================================================
