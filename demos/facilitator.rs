//! Example x402 facilitator service.
//!
//! A thin wrapper around [`x402_paygate::facilitator::http::router`] showing
//! how to wire a `ChainClient` and `FacilitatorConfig` into a standalone
//! Axum server. The `x402-facilitator` binary (`src/bin/facilitator.rs`) is
//! the production entrypoint; this example exists for readers who want the
//! library pieces spelled out in one file.
//!
//! Run with:
//! ```bash
//! cargo run --example facilitator
//! ```
//!
//! Environment variables: see spec.md §6 (`ARENA_SIGNER_PRIVATE_KEY`,
//! `X402_FACILITATOR_KEY`, `X402_RPC_URL`, `X402_NETWORK`,
//! `X402_ASSET_ADDRESS`, `X402_ASSET_SYMBOL`, `X402_ASSET_DECIMALS`,
//! `X402_ASSET_DOMAIN_NAME`, `X402_ASSET_DOMAIN_VERSION`, `X402_API_TREASURY`,
//! `X402_API_PRICE`).

use clap::Parser;
use std::sync::Arc;
use x402_paygate::chain::ChainClient;
use x402_paygate::facilitator::{FacilitatorArgs, FacilitatorConfig, FacilitatorCore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = FacilitatorArgs::parse();
    let config = FacilitatorConfig::from_args(args)?;

    println!("starting x402 example facilitator");
    println!("  network: {}", config.network);
    println!("  port: {}", config.port);

    let chain = ChainClient::connect(&config.rpc_url, &config.relayer_private_key).await?;
    let port = config.port;
    let bind_host = config.bind_host;
    let core = Arc::new(FacilitatorCore::new(Arc::new(chain), config));
    let router = x402_paygate::facilitator::http::router(core);

    let addr = std::net::SocketAddr::from((bind_host, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("facilitator listening on http://{addr}");

    axum::serve(listener, router).await?;
    Ok(())
}
