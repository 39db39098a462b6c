//! # Product Catalog
//!
//! Adding stock without duplicating products, plus direct catalog edits.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProposedProduct                                                        │
//! │       │ validate                                                        │
//! │       ▼                                                                 │
//! │  MatchKey (name, brand, category, price, flavour for liquids)           │
//! │       │                                                                 │
//! │       ▼  lock "{store}/{key}"                                           │
//! │  find_by_match_key ──── found ────► merge: stock += qty, codes ∪ code   │
//! │       │                                                                 │
//! │     none                                                                │
//! │       ▼                                                                 │
//! │  insert ──── UNIQUE(match_key) violated ───► ResolveConflict (retry)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-process lock serializes resolvers sharing this `ProductResolver`.
//! Writers in other processes are caught by the unique index instead.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use shopfloor_core::identity::{apply_edit, merge_into, new_product, MatchKey};
use shopfloor_core::validation::{validate_edit, validate_proposal, validate_scan_code};
use shopfloor_core::{Money, Product, ProductEdit, ProposedProduct};
use shopfloor_db::{Database, DbError, ProductFilter};

use crate::error::{ServiceError, ServiceResult};

/// Dead lock entries are swept once the map grows past this.
const LOCK_PRUNE_THRESHOLD: usize = 256;

/// Outcome of [`ProductResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub product: Product,
    /// True if the proposal was merged into an existing product.
    pub merged: bool,
}

// =============================================================================
// Keyed Locks
// =============================================================================

/// One async mutex per key, dropped when nobody holds it.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, weak| weak.strong_count() > 0);
            }

            match locks.get(&key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };

        lock.lock_owned().await
    }

    /// Locks two keys in a fixed order; one guard when they are equal.
    async fn acquire_pair(&self, a: String, b: String) -> Vec<OwnedMutexGuard<()>> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let mut guards = Vec::with_capacity(2);
        let same = first == second;
        guards.push(self.acquire(first).await);
        if !same {
            guards.push(self.acquire(second).await);
        }
        guards
    }

    #[cfg(test)]
    async fn live_keys(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Deduplicating "add product" plus the catalog operations around it.
///
/// Share one instance per process; the lock map is what serializes
/// concurrent adds of the same product.
#[derive(Debug, Default)]
pub struct ProductResolver {
    locks: KeyedLocks,
}

impl ProductResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a proposed product to a store, merging into an existing record
    /// with the same identity.
    ///
    /// ## Arguments
    /// * `db` - The tenant store
    /// * `store_name` - Name the store was routed by (lock scope)
    /// * `proposal` - The product and the units to add
    ///
    /// ## Returns
    /// * `Ok(Resolution { merged: true, .. })` - Stock and codes added to an existing product
    /// * `Ok(Resolution { merged: false, .. })` - New product created
    /// * `Err(ServiceError::ResolveConflict)` - Another process created it first; resolve again
    pub async fn resolve(
        &self,
        db: &Database,
        store_name: &str,
        proposal: &ProposedProduct,
    ) -> ServiceResult<Resolution> {
        validate_proposal(proposal)?;

        let key = MatchKey::of_proposal(proposal);
        let _guard = self.locks.acquire(format!("{}/{}", store_name, key.as_str())).await;

        let now = Utc::now();
        let products = db.products();

        if let Some(mut existing) = products.find_by_match_key(&key).await? {
            merge_into(&mut existing, proposal, now)?;
            products.apply_merge(&existing, proposal.quantity).await?;

            // Re-read: stock moved relative to the stored value.
            let product = products.get(&existing.id).await?.unwrap_or(existing);

            info!(
                store_name = %store_name,
                product_id = %product.id,
                added = proposal.quantity,
                stock = product.stock,
                "Merged proposal into existing product"
            );
            return Ok(Resolution {
                product,
                merged: true,
            });
        }

        let product = new_product(proposal, now);
        match products.insert(&product).await {
            Ok(()) => {
                info!(
                    store_name = %store_name,
                    product_id = %product.id,
                    match_key = %key,
                    "Created product"
                );
                Ok(Resolution {
                    product,
                    merged: false,
                })
            }
            Err(e) if e.is_unique_violation() => {
                debug!(store_name = %store_name, match_key = %key, "Lost product creation race");
                Err(ServiceError::ResolveConflict {
                    store_name: store_name.to_string(),
                    match_key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    pub async fn get(&self, db: &Database, id: &str) -> ServiceResult<Product> {
        db.products()
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id).into())
    }

    /// Lists products, newest first.
    pub async fn list(&self, db: &Database, filter: &ProductFilter) -> ServiceResult<Vec<Product>> {
        Ok(db.products().list(filter).await?)
    }

    /// Looks a product up by any of its scan codes.
    pub async fn find_by_scan_code(&self, db: &Database, code: &str) -> ServiceResult<Option<Product>> {
        let code = code.trim();
        validate_scan_code(code)?;
        if code.is_empty() {
            return Ok(None);
        }
        Ok(db.products().find_by_scan_code(code).await?)
    }

    /// Applies a partial edit.
    ///
    /// Both the current and the resulting identity are locked, so an edit
    /// never interleaves with a merge into either. Stock is only written
    /// when the edit sets it.
    ///
    /// An edit that gives the product the identity of another product fails
    /// with a unique violation; nothing is merged implicitly.
    pub async fn edit(
        &self,
        db: &Database,
        store_name: &str,
        id: &str,
        edit: &ProductEdit,
    ) -> ServiceResult<Product> {
        validate_edit(edit)?;

        loop {
            let snapshot = self.get(db, id).await?;
            let old_key = MatchKey::of_product(&snapshot);
            let mut preview = snapshot;
            apply_edit(&mut preview, edit, Utc::now());
            let new_key = MatchKey::of_product(&preview);

            let _guards = self
                .locks
                .acquire_pair(
                    format!("{}/{}", store_name, old_key.as_str()),
                    format!("{}/{}", store_name, new_key.as_str()),
                )
                .await;

            // Re-read under the locks; another edit may have moved it.
            let mut product = self.get(db, id).await?;
            if MatchKey::of_product(&product) != old_key {
                debug!(store_name = %store_name, product_id = %id, "Identity moved during edit, retrying");
                continue;
            }

            apply_edit(&mut product, edit, Utc::now());
            db.products().update(&product, edit.stock.is_some()).await?;

            let product = db.products().get(id).await?.unwrap_or(product);
            info!(store_name = %store_name, product_id = %id, "Product edited");
            return Ok(product);
        }
    }

    /// Changes a product's price. The price is part of its identity.
    pub async fn update_price(
        &self,
        db: &Database,
        store_name: &str,
        id: &str,
        price: Money,
    ) -> ServiceResult<Product> {
        let edit = ProductEdit {
            price: Some(price),
            ..ProductEdit::default()
        };
        self.edit(db, store_name, id, &edit).await
    }

    pub async fn delete(&self, db: &Database, store_name: &str, id: &str) -> ServiceResult<()> {
        db.products().delete(id).await?;
        info!(store_name = %store_name, product_id = %id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfloor_core::{CoreError, ProductCategory, ValidationError, MAX_QUANTITY};
    use shopfloor_db::{ConnectionRouter, RouterConfig};

    async fn store() -> (ConnectionRouter, Database) {
        let router = ConnectionRouter::new(RouterConfig::in_memory());
        let db = router.connection_for("shop_a").await.unwrap();
        (router, db)
    }

    fn coil_x(quantity: i64, code: &str) -> ProposedProduct {
        ProposedProduct::new("Coil X", "Vaporesso", ProductCategory::Coil, Money::from_cents(350))
            .with_quantity(quantity)
            .with_scan_code(code)
    }

    #[tokio::test]
    async fn test_same_product_twice_merges() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        let first = resolver.resolve(&db, "shop_a", &coil_x(10, "C1")).await.unwrap();
        assert!(!first.merged);

        let second = resolver.resolve(&db, "shop_a", &coil_x(5, "C2")).await.unwrap();
        assert!(second.merged);
        assert_eq!(second.product.id, first.product.id);
        assert_eq!(second.product.stock, 15);
        assert_eq!(second.product.scan_codes, vec!["C1", "C2"]);
        assert_eq!(second.product.scan_code, "C2");

        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resupplied_code_becomes_primary_again() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        resolver.resolve(&db, "shop_a", &coil_x(10, "C1")).await.unwrap();
        resolver.resolve(&db, "shop_a", &coil_x(5, "C2")).await.unwrap();
        let third = resolver.resolve(&db, "shop_a", &coil_x(1, "C1")).await.unwrap();

        assert_eq!(third.product.scan_code, "C1");
        assert_eq!(third.product.scan_codes, vec!["C1", "C2"]);
        assert_eq!(third.product.stock, 16);

        let stored = resolver.get(&db, &third.product.id).await.unwrap();
        assert_eq!(stored.scan_code, "C1");
    }

    #[tokio::test]
    async fn test_restock_past_the_ceiling_is_rejected() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        let full = resolver.resolve(&db, "shop_a", &coil_x(MAX_QUANTITY, "C1")).await.unwrap();

        let err = resolver.resolve(&db, "shop_a", &coil_x(1, "C2")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(ValidationError::TooLarge { .. }))
        ));
        assert!(resolver.resolve(&db, "shop_a", &coil_x(i64::MAX, "C3")).await.is_err());

        let stored = resolver.get(&db, &full.product.id).await.unwrap();
        assert_eq!(stored.stock, MAX_QUANTITY);
        assert_eq!(stored.scan_codes, vec!["C1"]);
    }

    #[tokio::test]
    async fn test_identity_ignores_case_and_whitespace() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        resolver.resolve(&db, "shop_a", &coil_x(1, "C1")).await.unwrap();
        let shouty = ProposedProduct::new("  COIL x ", "vaporesso", ProductCategory::Coil, Money::from_cents(350))
            .with_quantity(2);
        let merged = resolver.resolve(&db, "shop_a", &shouty).await.unwrap();

        assert!(merged.merged);
        assert_eq!(merged.product.stock, 3);
    }

    #[tokio::test]
    async fn test_price_difference_makes_a_new_product() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        resolver.resolve(&db, "shop_a", &coil_x(10, "C1")).await.unwrap();
        let pricier = ProposedProduct::new("Coil X", "Vaporesso", ProductCategory::Coil, Money::from_cents(400))
            .with_quantity(10);
        let other = resolver.resolve(&db, "shop_a", &pricier).await.unwrap();

        assert!(!other.merged);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_liquid_flavours_are_distinct() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();
        let liquid = |flavour: &str| {
            ProposedProduct::new("Salt 20mg", "Dinner Lady", ProductCategory::Liquid, Money::from_cents(1200))
                .with_flavour(flavour, 30)
                .with_quantity(5)
        };

        resolver.resolve(&db, "shop_a", &liquid("Mango")).await.unwrap();
        resolver.resolve(&db, "shop_a", &liquid("Mint")).await.unwrap();
        let again = resolver.resolve(&db, "shop_a", &liquid("mango ")).await.unwrap();

        assert!(again.merged);
        assert_eq!(again.product.stock, 10);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_merge_keeps_note_and_image_unless_given() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        let first = coil_x(1, "C1").with_note("Top shelf").with_image_ref("img/1.png");
        resolver.resolve(&db, "shop_a", &first).await.unwrap();

        let plain = resolver.resolve(&db, "shop_a", &coil_x(1, "C1").with_note("  ")).await.unwrap();
        assert_eq!(plain.product.note, "Top shelf");
        assert_eq!(plain.product.image_ref.as_deref(), Some("img/1.png"));
        assert_eq!(plain.product.scan_codes, vec!["C1"]);

        let updated = resolver
            .resolve(&db, "shop_a", &coil_x(1, "C1").with_note("Counter").with_image_ref("img/2.png"))
            .await
            .unwrap();
        assert_eq!(updated.product.note, "Counter");
        assert_eq!(updated.product.image_ref.as_deref(), Some("img/2.png"));
    }

    #[tokio::test]
    async fn test_invalid_proposal_is_rejected() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();

        let nameless = ProposedProduct::new("  ", "B", ProductCategory::Coil, Money::from_cents(100));
        let err = resolver.resolve(&db, "shop_a", &nameless).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let negative = coil_x(-1, "C1");
        assert!(resolver.resolve(&db, "shop_a", &negative).await.is_err());
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_adds_make_one_product() {
        let (_router, db) = store().await;
        let resolver = Arc::new(ProductResolver::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let resolver = Arc::clone(&resolver);
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve(&db, "shop_a", &coil_x(1, &format!("C{}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = db.products().list(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].stock, 16);
        assert_eq!(all[0].scan_codes.len(), 16);
        assert_eq!(resolver.locks.live_keys().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unshared_resolvers_conflict_instead_of_duplicating() {
        let (_router, db) = store().await;

        // Separate resolvers stand in for separate processes.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let resolver = ProductResolver::new();
                loop {
                    match resolver.resolve(&db, "shop_a", &coil_x(2, "C1")).await {
                        Err(e @ ServiceError::ResolveConflict { .. }) => assert!(e.is_retryable()),
                        other => return other,
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = db.products().list(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].stock, 16);
    }

    #[tokio::test]
    async fn test_edit_and_price_update() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();
        let created = resolver.resolve(&db, "shop_a", &coil_x(4, "C1")).await.unwrap().product;

        let edit = ProductEdit {
            name: Some("Coil X Mesh".to_string()),
            scan_code: Some("C9".to_string()),
            ..ProductEdit::default()
        };
        let edited = resolver.edit(&db, "shop_a", &created.id, &edit).await.unwrap();
        assert_eq!(edited.name, "Coil X Mesh");
        assert_eq!(edited.scan_code, "C9");
        assert!(edited.has_scan_code("C1"));

        let repriced = resolver
            .update_price(&db, "shop_a", &created.id, Money::from_cents(375))
            .await
            .unwrap();
        assert_eq!(repriced.price, Money::from_cents(375));

        // The new identity is what a later add merges into.
        let again = ProposedProduct::new("Coil X Mesh", "Vaporesso", ProductCategory::Coil, Money::from_cents(375))
            .with_quantity(1);
        let merged = resolver.resolve(&db, "shop_a", &again).await.unwrap();
        assert!(merged.merged);
        assert_eq!(merged.product.stock, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_edits_do_not_undo_concurrent_restocks() {
        let (_router, db) = store().await;
        let resolver = Arc::new(ProductResolver::new());
        let product = resolver.resolve(&db, "shop_a", &coil_x(0, "C1")).await.unwrap().product;

        let mut handles = Vec::new();
        for i in 0..16 {
            let resolver = Arc::clone(&resolver);
            let db = db.clone();
            let id = product.id.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let edit = ProductEdit {
                        note: Some(format!("shelf {}", i)),
                        ..ProductEdit::default()
                    };
                    resolver.edit(&db, "shop_a", &id, &edit).await.map(|_| ())
                } else {
                    resolver.resolve(&db, "shop_a", &coil_x(2, "C1")).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = resolver.get(&db, &product.id).await.unwrap();
        assert_eq!(stored.stock, 16);
        assert!(stored.note.starts_with("shelf"));
        assert_eq!(resolver.locks.live_keys().await, 0);
    }

    #[tokio::test]
    async fn test_edit_sets_stock_only_when_given() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();
        let product = resolver.resolve(&db, "shop_a", &coil_x(4, "C1")).await.unwrap().product;

        let counted = ProductEdit {
            stock: Some(9),
            ..ProductEdit::default()
        };
        assert_eq!(resolver.edit(&db, "shop_a", &product.id, &counted).await.unwrap().stock, 9);

        let too_many = ProductEdit {
            stock: Some(MAX_QUANTITY + 1),
            ..ProductEdit::default()
        };
        assert!(resolver.edit(&db, "shop_a", &product.id, &too_many).await.is_err());
        assert_eq!(resolver.get(&db, &product.id).await.unwrap().stock, 9);
    }

    #[tokio::test]
    async fn test_edit_onto_existing_identity_conflicts() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();
        resolver.resolve(&db, "shop_a", &coil_x(1, "C1")).await.unwrap();
        let cheaper = ProposedProduct::new("Coil X", "Vaporesso", ProductCategory::Coil, Money::from_cents(300));
        let other = resolver.resolve(&db, "shop_a", &cheaper).await.unwrap().product;

        let err = resolver
            .update_price(&db, "shop_a", &other.id, Money::from_cents(350))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Db(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_lookup_list_and_delete() {
        let (_router, db) = store().await;
        let resolver = ProductResolver::new();
        let coil = resolver.resolve(&db, "shop_a", &coil_x(1, "C1")).await.unwrap().product;
        resolver.resolve(&db, "shop_a", &coil_x(1, "C2")).await.unwrap();
        let device = ProposedProduct::new("Xros 3", "Vaporesso", ProductCategory::Device, Money::from_cents(3500));
        resolver.resolve(&db, "shop_a", &device).await.unwrap();

        // Legacy primary moved to C2; C1 is still found through the set.
        let by_old_code = resolver.find_by_scan_code(&db, " C1 ").await.unwrap().unwrap();
        assert_eq!(by_old_code.id, coil.id);
        assert!(resolver.find_by_scan_code(&db, "").await.unwrap().is_none());

        let coils = resolver
            .list(
                &db,
                &ProductFilter {
                    category: Some(ProductCategory::Coil),
                    ..ProductFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(coils.len(), 1);

        resolver.delete(&db, "shop_a", &coil.id).await.unwrap();
        assert!(resolver.get(&db, &coil.id).await.unwrap_err().is_not_found());
        assert!(resolver.delete(&db, "shop_a", &coil.id).await.is_err());
    }
}
