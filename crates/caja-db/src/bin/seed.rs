//! # Demo Terminal Seeder
//!
//! Prepares a database so a cashier can log in, open a shift and sell.
//!
//! ## Usage
//! ```bash
//! cargo run -p caja-db --bin seed
//!
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db --cashier c7 --register 3
//! ```
//!
//! ## What It Writes
//! - A CAI authorization for the cashier covering invoices 1..=5000
//! - An exchange rate of L 24.7500 per dollar
//! - Supervisor clearance code `1234`

use caja_core::day_range::{BusinessTimezone, DayRange};
use caja_core::{CaiAuthorization, ExchangeRate, InvoiceRange};
use caja_db::{Database, DbConfig};
use std::env;

const DEMO_CAI: &str = "35A1B2-C3D4E5-F6A7B8-C9D0E1-F2A3B4-C5";
const DEMO_RANGE: (i64, i64) = (1, 5000);
const DEMO_RATE: i64 = 247_500;
const DEMO_CODE: &str = "1234";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caja_dev.db");
    let mut cashier_id = String::from("c1");
    let mut register = String::from("1");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" if i + 1 < args.len() => {
                db_path = args[i + 1].clone();
                i += 1;
            }
            "--cashier" | "-c" if i + 1 < args.len() => {
                cashier_id = args[i + 1].clone();
                i += 1;
            }
            "--register" | "-r" if i + 1 < args.len() => {
                register = args[i + 1].clone();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Caja POS demo seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./caja_dev.db)");
                println!("  -c, --cashier <ID>       Cashier id (default: c1)");
                println!("  -r, --register <ID>      Assigned register (default: 1)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Caja POS demo seeder");
    println!("====================");
    println!("Database: {}", db_path);
    println!("Cashier:  {} (register {})", cashier_id, register);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let settings = db.settings();

    if let Some(existing) = settings.cai_for_cashier(&cashier_id).await? {
        println!(
            "⚠ Cashier already has CAI {} ({}..={}), leaving it",
            existing.cai,
            existing.range.start(),
            existing.range.end()
        );
    } else {
        let cai = CaiAuthorization {
            cashier_id: cashier_id.clone(),
            cai: DEMO_CAI.to_string(),
            range: InvoiceRange::new(DEMO_RANGE.0, DEMO_RANGE.1)?,
            register: register.clone(),
        };
        settings.upsert_cai(&cai).await?;
        println!("✓ CAI assigned: invoices {}..={}", DEMO_RANGE.0, DEMO_RANGE.1);
    }

    let today = DayRange::compute(None, &BusinessTimezone::honduras());
    let rate = ExchangeRate::from_ten_thousandths(DEMO_RATE);
    settings.set_exchange_rate(rate, today.start).await?;
    println!("✓ Exchange rate: L{}", rate);

    settings.set_authorization_code(DEMO_CODE).await?;
    println!("✓ Supervisor code: {}", DEMO_CODE);

    db.close().await;
    println!();
    println!("Done.");
    Ok(())
}
