//! # Seed Data Generator
//!
//! Registers a demo tenant and fills its store with staff and a catalog.
//!
//! ## Usage
//! ```bash
//! # Seed ./data/demo_shop.db (default)
//! cargo run -p shopfloor-db --bin seed
//!
//! # Custom data directory and store name
//! cargo run -p shopfloor-db --bin seed -- --data-dir ./var --store harbour
//! ```
//!
//! ## Generated Data
//! - A tenant row in the control plane
//! - One manager and two shopkeepers
//! - Devices, coils and e-liquids (each liquid in several flavours)
//!
//! Running the seed twice is harmless: existing tenants, staff and
//! products are left alone.

use chrono::Utc;
use std::env;
use std::path::PathBuf;

use shopfloor_core::identity::{new_product, MatchKey};
use shopfloor_core::{Money, NewTenant, ProductCategory, ProposedProduct, StaffRole};
use shopfloor_db::{ConnectionRouter, Database, RouterConfig};

/// (name, brand, price in cents, stock)
const DEVICES: &[(&str, &str, i64, i64)] = &[
    ("Xros 3", "Vaporesso", 3500, 12),
    ("Caliburn G2", "Uwell", 3200, 8),
    ("Drag S", "VooPoo", 5500, 5),
    ("Wenax K1", "GeekVape", 2200, 15),
];

const COILS: &[(&str, &str, i64, i64)] = &[
    ("GTX 0.6 Mesh", "Vaporesso", 350, 60),
    ("G2 0.8 Coil", "Uwell", 400, 45),
    ("PnP VM1", "VooPoo", 300, 80),
];

const LIQUID_LINES: &[(&str, &str, i64, i64)] = &[
    ("Nic Salt 20mg", "Dinner Lady", 1200, 30),
    ("Freebase 3mg", "Tokyo", 1500, 60),
];

const FLAVOURS: &[&str] = &["Mango Ice", "Strawberry", "Mint", "Tobacco"];

const STAFF: &[(&str, &str, StaffRole)] = &[
    ("manager", "Store Manager", StaffRole::Manager),
    ("ayesha", "Ayesha", StaffRole::Shopkeeper),
    ("bilal", "Bilal", StaffRole::Shopkeeper),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut data_dir = PathBuf::from("./data");
    let mut store_name = String::from("demo_shop");
    let mut tenant_name = String::from("Demo Shop");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    data_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    store_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    tenant_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Shopfloor Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --data-dir <DIR>   Store directory (default: ./data)");
                println!("  -s, --store <NAME>     Tenant store name (default: demo_shop)");
                println!("  -n, --name <NAME>      Tenant display name (default: Demo Shop)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Shopfloor Seed Data Generator");
    println!("================================");
    println!("Data dir: {}", data_dir.display());
    println!("Store:    {}", store_name);
    println!();

    std::fs::create_dir_all(&data_dir)?;
    let router = ConnectionRouter::new(RouterConfig::new(&data_dir));

    // Tenant
    let control = router.control_plane().await?;
    let tenant = match control.tenants().get_by_store_name(&store_name).await? {
        Some(tenant) => {
            println!("✓ Tenant '{}' already registered", tenant.name);
            tenant
        }
        None => {
            let tenant = control
                .tenants()
                .create(&NewTenant::new(&tenant_name, &store_name).with_location("Demo Street 1"))
                .await?;
            println!("✓ Registered tenant '{}' ({})", tenant.name, tenant.id);
            tenant
        }
    };

    let db = router.connection_for(&tenant.store_name).await?;
    println!("✓ Connected to tenant store, migrations applied");

    // Staff
    for (username, display_name, role) in STAFF {
        if db.staff().get_by_username(username).await?.is_some() {
            continue;
        }
        db.staff().create(username, display_name, *role).await?;
        println!("  + staff {} ({})", username, role);
    }

    // Catalog
    let start = std::time::Instant::now();
    let mut proposals = Vec::new();

    for (idx, (name, brand, price, stock)) in DEVICES.iter().enumerate() {
        proposals.push(
            ProposedProduct::new(*name, *brand, ProductCategory::Device, Money::from_cents(*price))
                .with_quantity(*stock)
                .with_cost(Money::from_cents(price * 70 / 100))
                .with_scan_code(format!("590100{:06}", idx)),
        );
    }
    for (idx, (name, brand, price, stock)) in COILS.iter().enumerate() {
        proposals.push(
            ProposedProduct::new(*name, *brand, ProductCategory::Coil, Money::from_cents(*price))
                .with_quantity(*stock)
                .with_cost(Money::from_cents(price * 60 / 100))
                .with_scan_code(format!("590200{:06}", idx)),
        );
    }
    for (line_idx, (name, brand, price, stock)) in LIQUID_LINES.iter().enumerate() {
        for (flavour_idx, flavour) in FLAVOURS.iter().enumerate() {
            proposals.push(
                ProposedProduct::new(*name, *brand, ProductCategory::Liquid, Money::from_cents(*price))
                    .with_flavour(*flavour, 30)
                    .with_quantity(*stock)
                    .with_cost(Money::from_cents(price * 55 / 100))
                    .with_scan_code(format!("590300{:03}{:03}", line_idx, flavour_idx)),
            );
        }
    }

    let generated = seed_catalog(&db, &proposals).await?;

    println!();
    println!(
        "✓ Added {} of {} products in {:?}",
        generated,
        proposals.len(),
        start.elapsed()
    );
    println!("  Catalog size: {}", db.products().count().await?);

    router.close_all().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Inserts every proposal whose identity is not in the catalog yet.
async fn seed_catalog(
    db: &Database,
    proposals: &[ProposedProduct],
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut generated = 0;

    for proposal in proposals {
        let key = MatchKey::of_proposal(proposal);
        if db.products().find_by_match_key(&key).await?.is_some() {
            continue;
        }

        let product = new_product(proposal, Utc::now());
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", key, e);
            continue;
        }
        generated += 1;
    }

    Ok(generated)
}
