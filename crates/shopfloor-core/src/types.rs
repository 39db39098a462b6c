//! # Domain Types
//!
//! Core domain types used throughout the Shopfloor back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  CONTROL PLANE            TENANT STORE                                  │
//! │  ┌─────────────────┐      ┌─────────────────┐   ┌─────────────────┐    │
//! │  │    Tenant       │      │    Product      │   │     Staff       │    │
//! │  │  ─────────────  │      │  ─────────────  │   │  ─────────────  │    │
//! │  │  id (UUID)      │      │  id (UUID)      │   │  id (UUID)      │    │
//! │  │  store_name ────┼──┐   │  category       │   │  username       │    │
//! │  │  location       │  │   │  price, stock   │   │  role           │    │
//! │  └─────────────────┘  │   │  scan_codes     │   └─────────────────┘    │
//! │                       │   └─────────────────┘                          │
//! │          one store per tenant                                          │
//! │                                                                         │
//! │  IN MEMORY                PERSISTED AT LOGOUT                           │
//! │  ┌─────────────────┐      ┌─────────────────┐   ┌─────────────────┐    │
//! │  │    Session      │ ───► │ SessionReport   │ ◄─│   SoldLine      │    │
//! │  │  sale_count     │close │ total_amount    │   │  qty × price    │    │
//! │  │  sale_total     │      │ cash_submitted  │   └─────────────────┘    │
//! │  └─────────────────┘      └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities carry a UUID `id` used for relations. Tenants also carry a
//! `store_name` (human readable, immutable) and products carry a match key
//! (see [`crate::identity`]) that decides whether two proposals are the same
//! catalog entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tenant
// =============================================================================

/// A retail outlet registered in the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tenant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name of the outlet.
    pub name: String,

    /// Name of the tenant's isolated store. Unique and never reused.
    pub store_name: String,

    /// Free-text location.
    pub location: String,

    /// Inactive tenants are kept for history but not warmed at startup.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub store_name: String,
    #[serde(default)]
    pub location: String,
}

impl NewTenant {
    pub fn new(name: impl Into<String>, store_name: impl Into<String>) -> Self {
        NewTenant {
            name: name.into(),
            store_name: store_name.into(),
            location: String::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

// =============================================================================
// Staff
// =============================================================================

/// Role of a staff member inside one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Works the counter; opens sessions and records sales.
    Shopkeeper,
    /// Manages catalog and reconciles cash.
    Manager,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Shopkeeper => write!(f, "shopkeeper"),
            StaffRole::Manager => write!(f, "manager"),
        }
    }
}

/// A staff account inside a tenant store.
///
/// Credentials live with the external authentication service, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Staff {
    pub id: String,
    /// Login name, unique within the tenant.
    pub username: String,
    pub display_name: String,
    pub role: StaffRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Identity of an authenticated caller, handed over by the authentication
/// service and trusted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub staff_id: String,
    pub display_name: String,
    pub role: StaffRole,
    pub tenant_id: String,
}

// =============================================================================
// Product Category
// =============================================================================

/// Catalog category of a product.
///
/// Only [`ProductCategory::Liquid`] products carry a flavour and a bottle
/// capacity, and only for them does the flavour take part in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum ProductCategory {
    Device,
    Coil,
    #[serde(rename = "E-Liquid")]
    Liquid,
}

impl ProductCategory {
    /// All categories, in display order.
    pub const ALL: [ProductCategory; 3] = [
        ProductCategory::Device,
        ProductCategory::Coil,
        ProductCategory::Liquid,
    ];

    /// Canonical label as shown to operators.
    pub const fn label(&self) -> &'static str {
        match self {
            ProductCategory::Device => "Device",
            ProductCategory::Coil => "Coil",
            ProductCategory::Liquid => "E-Liquid",
        }
    }

    #[inline]
    pub const fn is_liquid(&self) -> bool {
        matches!(self, ProductCategory::Liquid)
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProductCategory {
    type Err = ValidationError;

    /// Parses a category label, ignoring case and surrounding whitespace.
    /// `liquid` is accepted as an alias for `E-Liquid`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "device" => Ok(ProductCategory::Device),
            "coil" => Ok(ProductCategory::Coil),
            "e-liquid" | "eliquid" | "liquid" => Ok(ProductCategory::Liquid),
            _ => Err(ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: ProductCategory::ALL
                    .iter()
                    .map(|c| c.label().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry in a tenant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub name: String,
    pub brand: String,
    pub category: ProductCategory,

    /// Flavour, empty unless the category is Liquid.
    pub flavour: String,

    /// Bottle capacity in millilitres, 0 unless the category is Liquid.
    pub ml_capacity: i64,

    /// Selling price per unit.
    pub price: Money,

    /// Purchase cost per unit.
    pub cost: Money,

    /// Units on hand.
    pub stock: i64,

    /// Legacy primary scan code. Empty when the product has none.
    pub scan_code: String,

    /// Every scan code ever recorded for this product, in insertion order.
    pub scan_codes: Vec<String>,

    /// Short free-text description.
    pub note: String,

    /// Reference to an uploaded image, if any.
    pub image_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether this product answers to `code`, either through the
    /// legacy field or the scan-code set.
    pub fn has_scan_code(&self, code: &str) -> bool {
        !code.is_empty() && (self.scan_code == code || self.scan_codes.iter().any(|c| c == code))
    }

    /// Checks if the requested quantity is on hand.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

/// An "add product" request, before identity resolution.
///
/// ## Example
/// ```rust
/// use shopfloor_core::{Money, ProductCategory, ProposedProduct};
///
/// let p = ProposedProduct::new("Coil X", "Brand", ProductCategory::Coil, Money::from_cents(500))
///     .with_quantity(10)
///     .with_scan_code("C1");
/// assert_eq!(p.quantity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedProduct {
    pub name: String,
    pub brand: String,
    pub category: ProductCategory,
    #[serde(default)]
    pub flavour: String,
    #[serde(default)]
    pub ml_capacity: i64,
    pub price: Money,
    #[serde(default)]
    pub cost: Money,
    /// Units to add (or the initial stock for a new product).
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub scan_code: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Reference returned by the upload service, when an image was uploaded.
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl ProposedProduct {
    pub fn new(
        name: impl Into<String>,
        brand: impl Into<String>,
        category: ProductCategory,
        price: Money,
    ) -> Self {
        ProposedProduct {
            name: name.into(),
            brand: brand.into(),
            category,
            flavour: String::new(),
            ml_capacity: 0,
            price,
            cost: Money::zero(),
            quantity: 0,
            scan_code: None,
            note: None,
            image_ref: None,
        }
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_scan_code(mut self, code: impl Into<String>) -> Self {
        self.scan_code = Some(code.into());
        self
    }

    pub fn with_flavour(mut self, flavour: impl Into<String>, ml_capacity: i64) -> Self {
        self.flavour = flavour.into();
        self.ml_capacity = ml_capacity;
        self
    }

    pub fn with_cost(mut self, cost: Money) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// The proposed scan code, trimmed, or `None` when blank.
    pub fn trimmed_scan_code(&self) -> Option<&str> {
        self.scan_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A direct partial edit of a catalog entry. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEdit {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<ProductCategory>,
    pub flavour: Option<String>,
    pub ml_capacity: Option<i64>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub stock: Option<i64>,
    /// Replaces the legacy primary code; the old one stays in the set.
    pub scan_code: Option<String>,
    pub note: Option<String>,
    pub image_ref: Option<String>,
}

// =============================================================================
// Session
// =============================================================================

/// A live selling session, from login to logout. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    /// Number of sales recorded so far.
    pub sale_count: u64,
    /// Running total of recorded sale amounts.
    pub sale_total: Money,
}

impl Session {
    /// Starts a fresh session with zero counters.
    pub fn start(
        staff_id: impl Into<String>,
        staff_name: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            staff_id: staff_id.into(),
            staff_name: staff_name.into(),
            tenant_id: tenant_id.into(),
            started_at: Utc::now(),
            sale_count: 0,
            sale_total: Money::zero(),
        }
    }
}

// =============================================================================
// Session Report
// =============================================================================

/// One line of a session report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoldLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

impl SoldLine {
    /// Builds a line, computing `line_total = unit_price × quantity`.
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        SoldLine {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_total: unit_price.multiply_quantity(quantity),
        }
    }
}

/// Immutable record of a closed session, plus its reconciliation state.
///
/// ```text
///   total_amount ─────────────────────────────── fixed at close
///   cash_submitted  0 ──► 10.00 ──► 25.00         non-decreasing, ≤ total
///   remaining       25.00   15.00    0.00         derived
///   settled_at      None    None     Some(t)      stamped once
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Same as the session id.
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub lines: Vec<SoldLine>,
    pub total_items: i64,
    pub total_amount: Money,
    pub cash_submitted: Money,
    pub settled_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    /// Closes `session` into a report over `lines`.
    ///
    /// The total is the sum of the line totals, not the session's running
    /// counter. A report with nothing to collect is settled on the spot.
    pub fn from_session(session: Session, lines: Vec<SoldLine>, ended_at: DateTime<Utc>) -> Self {
        let total_amount: Money = lines.iter().map(|l| l.line_total).sum();
        let total_items = lines.iter().map(|l| l.quantity).sum();
        let settled_at = if total_amount.is_positive() {
            None
        } else {
            Some(ended_at)
        };

        SessionReport {
            id: session.id,
            staff_id: session.staff_id,
            staff_name: session.staff_name,
            tenant_id: session.tenant_id,
            started_at: session.started_at,
            ended_at,
            lines,
            total_items,
            total_amount,
            cash_submitted: Money::zero(),
            settled_at,
        }
    }

    /// What is still owed: `total_amount - cash_submitted`.
    #[inline]
    pub fn remaining_balance(&self) -> Money {
        self.total_amount - self.cash_submitted
    }

    /// A report is settled once nothing remains to be collected.
    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.remaining_balance().is_positive()
    }
}

/// A single sale persisted in the tenant's sales journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: String,
    pub session_id: String,
    pub staff_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub sold_at: DateTime<Utc>,
}

impl SaleRecord {
    /// The report line this sale contributes.
    pub fn to_line(&self) -> SoldLine {
        SoldLine {
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            line_total: self.line_total,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
