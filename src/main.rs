//! dashgate - authenticating reverse proxy for static dashboards
//!
//! Run with: cargo run -- serve
//! Or after build: ./target/release/dashgate serve

#[tokio::main]
async fn main() {
    // Load .env before reading DASHGATE_* variables
    let _ = dotenvy::dotenv();

    if let Err(e) = dashgate::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
