//! # Seed Data Generator
//!
//! Populates a development database with a small kirana catalog, a supplier
//! and one purchase invoice whose batches carry staggered expiry dates, so
//! FEFO billing can be tried straight away.
//!
//! ## Usage
//! ```bash
//! # Seed ./kirana.db (or $KIRANA_DB_PATH)
//! cargo run -p kirana-db --bin seed
//!
//! # Specify database path
//! cargo run -p kirana-db --bin seed -- --db ./data/kirana.db
//! ```

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use std::path::PathBuf;

use kirana_core::{Money, PartyKind, Percent};
use kirana_db::{init_tracing, AppConfig, Database, NewItem, PurchaseDraft, PurchaseLineDraft};

/// (sku, name, unit, sale rate in paise, purchase rate in paise, GST bps, shelf life in days)
const CATALOG: &[(&str, &str, &str, i64, i64, u32, Option<i64>)] = &[
    ("RICE-5KG", "Basmati Rice 5kg", "bag", 62_500, 54_000, 500, None),
    ("ATTA-10KG", "Wheat Atta 10kg", "bag", 45_000, 39_500, 0, Some(120)),
    ("DAL-TUR-1KG", "Toor Dal 1kg", "pkt", 16_500, 14_200, 0, Some(180)),
    ("OIL-SUN-1L", "Sunflower Oil 1L", "btl", 15_500, 13_300, 500, Some(270)),
    ("SUGAR-1KG", "Sugar 1kg", "pkt", 4_800, 4_100, 500, None),
    ("TEA-250G", "Assam Tea 250g", "pkt", 14_000, 11_800, 500, Some(365)),
    ("MILK-500ML", "Toned Milk 500ml", "pkt", 2_800, 2_500, 0, Some(2)),
    ("BISC-GLU", "Glucose Biscuits", "pkt", 1_000, 820, 1800, Some(90)),
    ("SOAP-BATH", "Bath Soap 100g", "pc", 4_500, 3_600, 1800, None),
    ("DET-1KG", "Detergent Powder 1kg", "pkt", 12_000, 9_800, 1800, None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = AppConfig::from_env();

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kirana POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $KIRANA_DB_PATH or ./kirana.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kirana POS Seed Data Generator");
    println!("=================================");
    println!("Database:   {}", config.database_path.display());
    println!("Home state: {}", config.home_state);
    println!();

    let db = Database::new(config.db_config())
        .await?
        .with_store(config.store_profile());

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let mut lines = Vec::with_capacity(CATALOG.len());

    for (sku, name, unit, sale, purchase, gst, shelf_life) in CATALOG {
        let item = db
            .items()
            .create(
                NewItem::new(*sku, *name, Money::from_paise(*sale), Percent::from_bps(*gst))
                    .purchase_rate(Money::from_paise(*purchase))
                    .unit(*unit),
            )
            .await?;

        let mut line = PurchaseLineDraft::new(&item.id, 24, Money::from_paise(*purchase));
        if let Some(days) = shelf_life {
            line = line.expiring(expiry(today, *days));
        }
        lines.push(line);
    }
    println!("✓ Created {} items", lines.len());

    let supplier = db
        .parties()
        .create("Shree Traders", PartyKind::Supplier, &config.home_state, None, None)
        .await?;

    let saved = db
        .purchases()
        .receive(PurchaseDraft {
            supplier_id: supplier.id.clone(),
            supplier_invoice_ref: Some("ST/0001".to_string()),
            lines,
        })
        .await?;

    println!(
        "✓ Received {} ({} batches, total {})",
        saved.purchase.purchase_number,
        saved.batches.len(),
        saved.purchase.totals.total
    );

    // Opening stock nearer expiry than the purchase, so FEFO sells it first.
    if let Some(milk) = db.items().get_by_sku("MILK-500ML").await? {
        db.batches()
            .receive(
                &milk.id,
                6,
                milk.purchase_rate,
                Some(expiry(today, 1)),
                Some("OPENING".to_string()),
            )
            .await?;
        println!("✓ Added opening stock for {}", milk.name);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn expiry(today: NaiveDate, days: i64) -> NaiveDate {
    today + Duration::days(days)
}
