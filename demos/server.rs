//! Example seller server, using the Payment Gate as `tower` middleware.
//!
//! Run with:
//! ```bash
//! cargo run --example server
//! ```
//!
//! Environment variables:
//! - `PAY_TO`: address to receive settled payments
//! - `FACILITATOR_URL`: base URL of a running facilitator (e.g. from the
//!   `facilitator` example, or the `x402-facilitator` binary)
//! - `X402_FACILITATOR_KEY`: shared secret the facilitator expects
//! - `PORT`: server port (default 3000)

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use x402_paygate::gate::facilitator_client::FacilitatorClient;
use x402_paygate::gate::{PaymentGateConfig, PaymentGateLayer};
use x402_paygate::types::{PaymentRequirements, RequirementsExtra};

async fn weather_handler() -> Json<serde_json::Value> {
    Json(json!({
        "location": "San Francisco",
        "temperature": 68,
        "conditions": "Sunny",
        "humidity": 65,
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "protocol": "x402", "version": 2 }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let pay_to = std::env::var("PAY_TO")
        .unwrap_or_else(|_| "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string());
    let facilitator_url =
        std::env::var("FACILITATOR_URL").unwrap_or_else(|_| "http://127.0.0.1:3849".to_string());
    let facilitator_key = std::env::var("X402_FACILITATOR_KEY")
        .unwrap_or_else(|_| "dev-secret".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()?;

    println!("starting x402 example server");
    println!("  pay to: {pay_to}");
    println!("  facilitator: {facilitator_url}");
    println!("  port: {port}");

    let requirements = PaymentRequirements {
        scheme: "exact".to_string(),
        network: "eip155:8453".to_string(),
        asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(), // USDC on Base
        pay_to,
        amount: "10000".to_string(), // $0.01
        resource: "/weather".to_string(),
        description: Some("Weather API access".to_string()),
        mime_type: Some("application/json".to_string()),
        max_timeout_seconds: 300,
        extra: RequirementsExtra::Transfer {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
        },
    };

    let gate = PaymentGateLayer::new(PaymentGateConfig {
        requirements,
        facilitator: FacilitatorClient::new(facilitator_url, facilitator_key),
    });

    let app = Router::new()
        .route("/weather", get(weather_handler).layer(gate))
        .route("/health", get(health_handler));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
