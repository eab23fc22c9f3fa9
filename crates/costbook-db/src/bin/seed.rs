//! # Seed Demo Data
//!
//! Fills a database with a small candle workshop: a material catalog, a
//! purchase history imported from CSV, a nested bill of materials, and a
//! cost sheet.
//!
//! ## Usage
//! ```bash
//! cargo run -p costbook-db --bin seed -- --db ./costbook.db
//! ```

use std::env;
use std::path::PathBuf;

use costbook_core::{
    validate_and_normalize, AppSettings, BomKind, BomLine, BomRecord, CostSheet, LaborItem,
    MaterialItem, MaterialRecord, Money, OverheadItem,
};
use costbook_db::{init_tracing, CostbookConfig, Database, DbConfig, RecordStore, StorageMode};
use tracing::{info, warn};

/// Catalog entries: (name, unit, unit cost in cents).
const CATALOG: &[(&str, &str, i64)] = &[
    ("Soy wax", "kg", 820),
    ("Cotton wick", "pcs", 12),
    ("Amber jar", "pcs", 145),
    ("Fragrance oil", "ml", 9),
    ("Satin ribbon", "m", 35),
    ("Gift box", "pcs", 110),
];

/// Purchase history as exported from a spreadsheet.
const PURCHASES_CSV: &str = "\
Description,Quantity,Cost,Usable Quantity,Purchase Date,Material,Store
Soy wax flakes 10kg,10,$84.50,10,2026-09-02,Soy wax,Candle Supply Co
Wick bundle,100,$11.00,100,2026-09-02,Cotton wick,Candle Supply Co
Amber jars case,24,$36.00,22,2026-09-10,Amber jar,Glassworks
Lavender oil,500,$42.00,480,2026-09-14,Fragrance oil,
Packing tape,6,$9.00,6,2026-09-15,,Office Depot
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Costbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from config)");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = CostbookConfig::load_or_default(config_path);
    if db_path.is_none() && config.mode() == StorageMode::Local {
        warn!(
            local_path = ?config.storage.local_path,
            "Config selects guest mode; seeding the SQLite database anyway"
        );
    }
    let owner = config.owner_id().to_string();
    let db_config = match db_path {
        Some(path) => DbConfig::new(path),
        None => config.to_db_config(),
    };

    info!(path = ?db_config.database_path, owner = %owner, "Seeding costbook database");
    let db = Database::new(db_config).await?;

    if db.materials().count(&owner).await? > 0 {
        warn!("Database already has materials; delete the file to regenerate");
        return Ok(());
    }

    // Catalog
    let mut catalog = Vec::with_capacity(CATALOG.len());
    for (name, unit, cost) in CATALOG {
        let material = db.materials().insert(&owner, &MaterialRecord::new(*name, *unit, *cost)).await?;
        catalog.push(material);
    }
    info!(count = catalog.len(), "Material catalog created");

    // Purchases refresh catalog costs for linked materials
    let normalized = validate_and_normalize(PURCHASES_CSV)?;
    info!(rows = normalized.row_count, message = %normalized.message, "Purchase file normalized");
    let purchases = db.purchases().import_tsv(&owner, &normalized.tsv).await?;
    info!(count = purchases.len(), "Purchases imported");
    let catalog = db.materials().list_active(&owner).await?;

    // Nested BOM: the candle is a part of the gift set
    let id_of = |name: &str| {
        catalog
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.id.clone())
            .ok_or_else(|| format!("material '{name}' missing from catalog"))
    };

    let mut candle = BomRecord::new("Lavender candle", BomKind::Part, 1.0, "pcs");
    candle.lines = vec![
        BomLine::material(id_of("Soy wax")?, 0.2, "kg"),
        BomLine::material(id_of("Cotton wick")?, 1.0, "pcs"),
        BomLine::material(id_of("Amber jar")?, 1.0, "pcs"),
        BomLine::material(id_of("Fragrance oil")?, 12.0, "ml"),
    ];
    let candle = db.boms().insert(&owner, &candle).await?;

    let mut gift_set = BomRecord::new("Gift set", BomKind::Product, 1.0, "set");
    gift_set.lines = vec![
        BomLine::sub_assembly(candle.id.clone(), 2.0, "pcs"),
        BomLine::material(id_of("Satin ribbon")?, 0.5, "m"),
        BomLine::material(id_of("Gift box")?, 1.0, "pcs"),
    ];
    let gift_set = db.boms().insert(&owner, &gift_set).await?;

    let resolved = db.boms().resolve_cost(&owner, &gift_set.id).await?;
    info!(
        bom = %gift_set.name,
        total = %Money::from_cents(resolved.total_cents),
        per_unit = %Money::from_cents(resolved.unit_cost_cents),
        warnings = resolved.warnings.len(),
        "Gift set cost resolved"
    );

    // Cost sheet for a batch of candles
    let settings = db.settings().get_or_create(&owner).await?;
    let sheet = db.cost_sheets().insert(&owner, &candle_sheet(&settings, &catalog)).await?;
    let totals = db.cost_sheets().totals(&owner, &sheet.id).await?;

    match totals.price_per_unit_cents {
        Some(price) => info!(
            sheet = %sheet.name,
            batch = %Money::from_cents(totals.batch_total_cents),
            price = %settings.round_price(Money::from_cents(price)),
            "Cost sheet created"
        ),
        None => warn!(sheet = %sheet.name, "Cost sheet has no per-unit price"),
    }

    db.close().await;
    info!("Seed complete");
    Ok(())
}

/// A batch of twelve candles priced from the seeded catalog.
fn candle_sheet(settings: &AppSettings, catalog: &[MaterialRecord]) -> CostSheet {
    let mut sheet = CostSheet::with_defaults("Lavender candle", settings);
    sheet.sku = "CNDL-LAV-8OZ".to_string();
    sheet.unit_name = "candle".to_string();
    sheet.batch_size = 12.0;
    sheet.waste_pct = 5.0;

    let usage = [("Soy wax", 2.4), ("Cotton wick", 12.0), ("Amber jar", 12.0), ("Fragrance oil", 144.0)];
    sheet.materials = usage
        .iter()
        .filter_map(|(name, quantity)| {
            catalog.iter().find(|m| m.name == *name).map(|m| MaterialItem {
                id: costbook_core::generate_id(),
                name: m.name.clone(),
                quantity: *quantity,
                unit: m.unit.clone(),
                unit_cost_cents: m.unit_cost_cents,
            })
        })
        .collect();

    sheet.labor = vec![LaborItem {
        id: costbook_core::generate_id(),
        role: "Pouring".to_string(),
        hours: 1.5,
        rate_cents: 1800,
    }];

    sheet.overhead = vec![
        OverheadItem::Flat {
            id: costbook_core::generate_id(),
            name: "Studio rent share".to_string(),
            amount_cents: 600,
        },
        OverheadItem::Percent {
            id: costbook_core::generate_id(),
            name: "Card fees".to_string(),
            percent: 3.0,
        },
    ];

    sheet
}
