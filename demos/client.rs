//! Example x402 client.
//!
//! Demonstrates making a request against an x402-protected endpoint,
//! automatically handling the 402 negotiation.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```
//!
//! Environment variables:
//! - `PRIVATE_KEY`: payer's private key for signing authorizations
//! - `CHAIN_ID`: chain ID the signature is scoped to (default 8453, Base)
//! - `API_URL`: protected resource URL to access

use x402_paygate::client::{get, X402ClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let private_key = std::env::var("PRIVATE_KEY").unwrap_or_else(|_| {
        println!("no PRIVATE_KEY set, using example key (DO NOT USE IN PRODUCTION)");
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8".to_string()
    });

    let chain_id: u64 = std::env::var("CHAIN_ID")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8453);

    let api_url =
        std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000/weather".to_string());

    println!("x402 example client");
    println!("  chain id: {chain_id}");
    println!("  api: {api_url}");

    let config = X402ClientConfig::new(&private_key, chain_id);

    println!("making request to protected endpoint...");
    let outcome = get(&config, &api_url).await?;
    println!("response status: {}", outcome.response.status());

    if let Some(settlement) = &outcome.settlement {
        println!("payment settled: {}", serde_json::to_string_pretty(settlement)?);
    }

    let body = outcome.response.text().await?;
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
        println!("\nresponse body:\n{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("\nresponse body:\n{body}");
    }

    Ok(())
}
