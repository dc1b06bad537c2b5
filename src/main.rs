//! budgeteer server
//!
//! Serves the budget REST API over Axum:
//! - Storage: per-user JSON documents + users file on disk
//! - Auth: bcrypt password hashes, JWT bearer tokens
//!
//! Usage:
//!   cargo run --bin seed_demo       # optional: demo user with sample data
//!   cargo run --bin budgeteer       # start server
//!   # then drive it with budgeteer-cli (see src/bin/cli.rs)

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use budgeteer::rest::create_router;
use budgeteer::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = std::env::var("BUDGET_DATA_DIR").unwrap_or_else(|_| "budget_data".to_string());
    let addr: SocketAddr = std::env::var("BUDGET_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let storage = Storage::open(&data_dir)?;
    info!(%addr, data_dir = %data_dir, "budgeteer starting");

    let app = create_router(storage);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
