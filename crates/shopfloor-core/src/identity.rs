//! # Product Identity
//!
//! Decides whether an "add product" request names an existing catalog entry
//! and, if so, how the request folds into it.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProposedProduct                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MatchKey::of_proposal                                                  │
//! │    name   ── trim + lowercase ──┐                                       │
//! │    brand  ── trim + lowercase ──┤                                       │
//! │    category ────────────────────┼──► "coil x␟b␟Coil␟500"               │
//! │    price (cents) ───────────────┤                                       │
//! │    flavour (E-Liquid only) ─────┘                                       │
//! │       │                                                                 │
//! │       ├── key found in store ──► merge_into(existing)                   │
//! │       │                            stock += quantity                    │
//! │       │                            note / image replaced if given       │
//! │       │                            scan codes merged                    │
//! │       │                                                                 │
//! │       └── key not found ────────► new_product                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Price is part of identity: the same item at two prices is two entries.
//!
//! ## Scan Codes
//! A product has a legacy primary code (`scan_code`) and a set of all codes
//! (`scan_codes`). Older records may hold a primary code that never made it
//! into the set, so every merge first migrates the primary into the set.
//! A code once recorded is never dropped by a merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::types::{Product, ProductCategory, ProductEdit, ProposedProduct};
use crate::validation::ValidationResult;
use crate::MAX_QUANTITY;

/// Separates the parts of a match key. Cannot appear in typed input.
const KEY_SEPARATOR: char = '\u{1f}';

// =============================================================================
// Match Key
// =============================================================================

/// The identity of a catalog entry inside one tenant store.
///
/// Persisted alongside the product under a UNIQUE index so the store itself
/// rejects a second entry with the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchKey(String);

impl MatchKey {
    /// Builds a key from raw attribute values.
    ///
    /// `flavour` is ignored unless `category` is Liquid.
    pub fn new(
        name: &str,
        brand: &str,
        category: ProductCategory,
        price_cents: i64,
        flavour: &str,
    ) -> Self {
        let mut key = String::with_capacity(name.len() + brand.len() + flavour.len() + 24);
        key.push_str(&normalize(name));
        key.push(KEY_SEPARATOR);
        key.push_str(&normalize(brand));
        key.push(KEY_SEPARATOR);
        key.push_str(category.label());
        key.push(KEY_SEPARATOR);
        key.push_str(&price_cents.to_string());
        if category.is_liquid() {
            key.push(KEY_SEPARATOR);
            key.push_str(&normalize(flavour));
        }
        MatchKey(key)
    }

    /// The key a proposal would be stored under.
    pub fn of_proposal(proposal: &ProposedProduct) -> Self {
        MatchKey::new(
            &proposal.name,
            &proposal.brand,
            proposal.category,
            proposal.price.cents(),
            &proposal.flavour,
        )
    }

    /// The key of an existing product.
    pub fn of_product(product: &Product) -> Self {
        MatchKey::new(
            &product.name,
            &product.brand,
            product.category,
            product.price.cents(),
            &product.flavour,
        )
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps a key read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        MatchKey(raw.into())
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Separator is unprintable; show it as '|'.
        for (i, part) in self.0.split(KEY_SEPARATOR).enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

// =============================================================================
// Creation
// =============================================================================

/// Builds a brand-new catalog entry from a proposal.
///
/// Name and brand are trimmed. Flavour and capacity are kept only for
/// liquids. The proposed scan code, if any, becomes both the primary code
/// and the only member of the set.
pub fn new_product(proposal: &ProposedProduct, now: DateTime<Utc>) -> Product {
    let code = proposal.trimmed_scan_code().unwrap_or_default().to_string();
    let scan_codes = if code.is_empty() {
        Vec::new()
    } else {
        vec![code.clone()]
    };
    let (flavour, ml_capacity) = if proposal.category.is_liquid() {
        (proposal.flavour.trim().to_string(), proposal.ml_capacity)
    } else {
        (String::new(), 0)
    };

    Product {
        id: uuid::Uuid::new_v4().to_string(),
        name: proposal.name.trim().to_string(),
        brand: proposal.brand.trim().to_string(),
        category: proposal.category,
        flavour,
        ml_capacity,
        price: proposal.price,
        cost: proposal.cost,
        stock: proposal.quantity,
        scan_code: code,
        scan_codes,
        note: proposal.note.as_deref().map(str::trim).unwrap_or_default().to_string(),
        image_ref: proposal.image_ref.clone(),
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Merging
// =============================================================================

/// Folds a matching proposal into an existing product.
///
/// ## Rules
/// - `stock += quantity`
/// - note replaced only when the proposal carries a non-empty note
/// - image replaced only when the proposal carries a new image reference
/// - scan codes merged as in [`merge_scan_codes`]
///
/// Name, brand, price and category already match and are left as stored.
///
/// ## Returns
/// * `Err(ValidationError::TooLarge)` - The stock would pass [`MAX_QUANTITY`];
///   `existing` is left untouched
pub fn merge_into(
    existing: &mut Product,
    proposal: &ProposedProduct,
    now: DateTime<Utc>,
) -> ValidationResult<()> {
    existing.stock = existing
        .stock
        .checked_add(proposal.quantity)
        .filter(|stock| *stock <= MAX_QUANTITY)
        .ok_or_else(|| ValidationError::TooLarge {
            field: "stock".to_string(),
            max: MAX_QUANTITY,
        })?;

    if let Some(note) = proposal.note.as_deref().map(str::trim) {
        if !note.is_empty() {
            existing.note = note.to_string();
        }
    }

    if let Some(image_ref) = &proposal.image_ref {
        existing.image_ref = Some(image_ref.clone());
    }

    merge_scan_codes(
        &mut existing.scan_code,
        &mut existing.scan_codes,
        proposal.trimmed_scan_code(),
    );

    existing.updated_at = now;
    Ok(())
}

/// Merges an incoming scan code into a product's codes.
///
/// 1. A non-empty legacy primary code missing from the set is appended.
/// 2. A non-empty incoming code is appended if missing, and always becomes
///    the new primary code, even when the set already held it.
///
/// ## Example
/// ```rust
/// use shopfloor_core::identity::merge_scan_codes;
///
/// let mut primary = "OLD".to_string();
/// let mut codes = vec!["C1".to_string()];
/// merge_scan_codes(&mut primary, &mut codes, Some("C2"));
///
/// assert_eq!(codes, vec!["C1", "OLD", "C2"]);
/// assert_eq!(primary, "C2");
/// ```
pub fn merge_scan_codes(primary: &mut String, codes: &mut Vec<String>, incoming: Option<&str>) {
    if !primary.is_empty() && !codes.iter().any(|c| c == primary) {
        codes.push(primary.clone());
    }

    if let Some(code) = incoming.map(str::trim).filter(|c| !c.is_empty()) {
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
        *primary = code.to_string();
    }
}

// =============================================================================
// Direct Edits
// =============================================================================

/// Applies a direct edit to a product.
///
/// The caller must recompute the match key afterwards; an edit may move the
/// product onto another product's identity, which the store then rejects.
/// A replaced primary scan code stays in the set.
pub fn apply_edit(product: &mut Product, edit: &ProductEdit, now: DateTime<Utc>) {
    if let Some(name) = &edit.name {
        product.name = name.trim().to_string();
    }
    if let Some(brand) = &edit.brand {
        product.brand = brand.trim().to_string();
    }
    if let Some(category) = edit.category {
        product.category = category;
    }
    if let Some(flavour) = &edit.flavour {
        product.flavour = flavour.trim().to_string();
    }
    if let Some(ml) = edit.ml_capacity {
        product.ml_capacity = ml;
    }
    if !product.category.is_liquid() {
        product.flavour.clear();
        product.ml_capacity = 0;
    }
    if let Some(price) = edit.price {
        product.price = price;
    }
    if let Some(cost) = edit.cost {
        product.cost = cost;
    }
    if let Some(stock) = edit.stock {
        product.stock = stock;
    }
    if let Some(note) = &edit.note {
        product.note = note.trim().to_string();
    }
    if let Some(image_ref) = &edit.image_ref {
        product.image_ref = Some(image_ref.clone());
    }
    if let Some(code) = &edit.scan_code {
        let code = code.trim();
        merge_scan_codes(&mut product.scan_code, &mut product.scan_codes, None);
        if !code.is_empty() && !product.scan_codes.iter().any(|c| c == code) {
            product.scan_codes.push(code.to_string());
        }
        product.scan_code = code.to_string();
    }
    product.updated_at = now;
}

// =============================================================================
// Unit Tests
// =============================================================================
