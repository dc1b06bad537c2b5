//! Seed script for budgeteer
//!
//! Populates the storage directory with a demo user (demo/demo) holding a
//! fixed-expense catalog and one month of sample data.
//! Run: cargo run --bin seed_demo

use rust_decimal::Decimal;

use budgeteer::auth::hash_password;
use budgeteer::storage::Storage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = std::env::var("BUDGET_DATA_DIR").unwrap_or_else(|_| "budget_data".to_string());
    let storage = Storage::open(&data_dir)?;

    let hash = hash_password("demo")?;
    let _ = storage.register_user("demo", &hash); // ignore if already registered

    let mut book = storage.load_book("demo")?;
    if !book.months.is_empty() {
        println!("demo user already has data in {}, leaving it alone", data_dir);
        return Ok(());
    }

    book.add_fixed_expense("Alquiler", Decimal::from(650))?;
    book.add_fixed_expense("Internet", Decimal::new(3990, 2))?;
    book.create_month("enero", Decimal::from(1800))?;
    book.add_variable_expense("Supermercado", Decimal::new(8250, 2), "05", "01")?;
    book.add_variable_expense("Transporte", Decimal::new(1540, 2), "09", "01")?;
    storage.save_book("demo", &book)?;

    println!("Seeded demo user (demo/demo) in {}", data_dir);
    Ok(())
}
