//! x402 facilitator HTTP entrypoint.
//!
//! Binds loopback-only (spec.md §4.2, "Loopback bind mandatory") and exposes
//! verify/settle/health/demo-ai. Holds the relayer private key for the
//! lifetime of the process — never pass it to any other component.

use axum::http::Method;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use x402_paygate::chain::ChainClient;
use x402_paygate::facilitator::{FacilitatorArgs, FacilitatorConfig, FacilitatorCore};
use x402_paygate::sig_down::SigDown;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = FacilitatorArgs::parse();
    let config = FacilitatorConfig::from_args(args)?;

    tracing::info!(network = %config.network, port = config.port, "connecting to chain");
    let chain = ChainClient::connect(&config.rpc_url, &config.relayer_private_key).await?;
    let port = config.port;
    let bind_host = config.bind_host;

    let core = Arc::new(FacilitatorCore::new(Arc::new(chain), config));

    let router = x402_paygate::facilitator::http::router(core)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any)
                .expose_headers(cors::Any),
        );

    let addr = SocketAddr::from((bind_host, port));
    tracing::info!("facilitator listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await?;

    Ok(())
}
