//! # Seed Data Generator
//!
//! Populates the database with products, a client and an exchange rate for
//! development.
//!
//! ## Usage
//! ```bash
//! # 60 products at the default rate
//! cargo run -p mercado-db --bin seed
//!
//! # Custom amount, path and rate
//! cargo run -p mercado-db --bin seed -- --count 200 --db ./data/mercado.db --rate 36.72
//!
//! # Also ring up one sale, void it and print the ledger check
//! cargo run -p mercado-db --bin seed -- --demo
//! ```
//!
//! `MERCADO_DB_PATH` (from the environment or `.env`) is used when `--db` is
//! not given.
//!
//! ## Generated Products
//! Each product gets:
//! - A name from a small grocery list plus a size
//! - A price between $0.50 and $9.49 (some with three decimals)
//! - Stock between 0 and 120 and a low-stock threshold of 5

use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use rust_decimal::Decimal;

use mercado_core::{CartLine, ExchangeRate, Money, NewProduct, PaymentInput, SaleRequest};
use mercado_db::{init_tracing, Database, EngineConfig, NewClient, SaleEngine, SaleFilter};

/// Product names for realistic test data
const PRODUCTS: &[&str] = &[
    "Harina PAN",
    "Arroz Mary",
    "Pasta Primor",
    "Azúcar Montalbán",
    "Café Fama de América",
    "Aceite Diana",
    "Leche Completa",
    "Queso Blanco",
    "Mantequilla",
    "Atún en Lata",
    "Sardinas",
    "Caraotas Negras",
    "Salsa de Tomate",
    "Mayonesa",
    "Galletas María",
    "Jabón de Tocador",
    "Detergente",
    "Papel Higiénico",
    "Agua Mineral",
    "Refresco de Cola",
];

/// Size variants for products
const SIZES: &[&str] = &["250g", "500g", "1kg"];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Mercado POS seed data generator")]
struct Args {
    /// Number of products to generate
    #[arg(short, long, default_value_t = 60)]
    count: usize,

    /// Database file path (defaults to MERCADO_DB_PATH or ./mercado.db)
    #[arg(short, long)]
    db: Option<String>,

    /// Current exchange rate, Bs per USD
    #[arg(short, long, default_value = "36.50")]
    rate: String,

    /// Run one sale and one void after seeding
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(path) = args.db {
        config.database_path = path.into();
    }
    let rate = ExchangeRate::new(Decimal::from_str(&args.rate)?)?;

    println!("🌱 Mercado POS Seed Data Generator");
    println!("==================================");
    println!("Database: {}", config.database_path.display());
    println!("Products: {}", args.count);
    println!("Rate:     {} Bs/USD", rate);
    println!();

    let db = Database::new(config.db_config()).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    db.rates().record(rate).await?;
    println!("✓ Exchange rate recorded");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping product seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
    } else {
        seed_products(&db, args.count).await?;

        let client = db
            .clients()
            .insert(&NewClient {
                name: "Cliente de Prueba".to_string(),
                document_id: Some("V-00000001".to_string()),
                phone: Some("0414-0000000".to_string()),
            })
            .await?;
        println!("✓ Client #{} created", client.id);
    }

    if args.demo {
        let engine = SaleEngine::new(db.clone(), Arc::new(db.rates()))
            .with_page_limit(config.sales_page_limit);
        run_demo(&engine).await?;
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn seed_products(db: &Database, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    for seed in 0..count {
        let product = generate_product(seed);
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.name, e);
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {} products in {:?}", generated, start.elapsed());
    println!("  Low stock: {}", db.ledger().low_stock().await?.len());

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(seed: usize) -> NewProduct {
    let name = PRODUCTS[seed % PRODUCTS.len()];
    let size = SIZES[(seed / PRODUCTS.len()) % SIZES.len()];

    // $0.50 - $9.49, every seventh product priced to the tenth of a cent
    let price = if seed % 7 == 0 {
        Decimal::new(500 + ((seed * 173) % 9000) as i64, 3)
    } else {
        Decimal::new(50 + ((seed * 17) % 900) as i64, 2)
    };

    NewProduct {
        name: format!("{} {}", name, size),
        list_price: Money::new(price.normalize()),
        quantity: (seed % 121) as i64,
        min_stock: 5,
    }
}

/// Sells two units of the best-stocked product, voids the sale and prints the
/// ledger check for it.
async fn run_demo(engine: &SaleEngine) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("Running demo sale...");

    let db = engine.database();
    let Some(product) = db
        .products()
        .list_active(500)
        .await?
        .into_iter()
        .max_by_key(|p| p.quantity)
        .filter(|p| p.quantity >= 2)
    else {
        println!("⚠ No product with stock, skipping demo");
        return Ok(());
    };

    let Some(owed) = product.list_price.checked_mul_quantity(2) else {
        println!("⚠ Price of {} too large to sell, skipping demo", product.name);
        return Ok(());
    };
    let receipt = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(product.id, 2)],
            vec![PaymentInput::new("cash-usd", owed)],
        ))
        .await?;
    println!(
        "✓ Sale #{}: {} x2 = ${} ({} Bs)",
        receipt.id, product.name, receipt.total_usd, receipt.total_bs
    );

    engine.void_sale(receipt.id, Some("seed demo")).await?;
    println!("✓ Sale #{} voided", receipt.id);

    let listed = engine.list_sales(&SaleFilter::default().with_limit(5)).await?;
    println!("  Recent sales: {}", listed.len());

    let check = db.ledger().verify(product.id).await?;
    println!(
        "  Ledger check for product #{}: expected Δ {}, recorded Δ {} → {}",
        check.product_id,
        check.expected_delta,
        check.recorded_delta,
        if check.consistent { "consistent" } else { "DRIFT" }
    );

    Ok(())
}
