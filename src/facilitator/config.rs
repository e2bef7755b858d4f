//! Facilitator process configuration.
//!
//! `clap::Parser` over the env vars from spec.md §6, loaded after
//! `dotenvy::dotenv()` at binary start — the same CLI-args-plus-env pattern
//! `x402-rs-x402-rs/facilitator/src/config.rs` uses, simplified here since
//! this crate has no multi-chain registry to describe.

use crate::errors::{Result, X402Error};
use crate::types::{AssetDescriptor, AssetRegistry};
use clap::Parser;
use ethers::types::Address;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Facilitator CLI/env configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "x402-facilitator", about = "x402 v2 payment facilitator")]
pub struct FacilitatorArgs {
    /// RPC endpoint for the configured chain.
    #[arg(long, env = "X402_RPC_URL")]
    pub rpc_url: String,

    /// Relayer private key. Pays gas, never holds buyer funds.
    #[arg(long, env = "ARENA_SIGNER_PRIVATE_KEY")]
    pub relayer_private_key: String,

    /// Shared secret required on every endpoint but `/x402/health`.
    #[arg(long, env = "X402_FACILITATOR_KEY")]
    pub facilitator_key: String,

    /// Loopback port to bind.
    #[arg(long, env = "X402_FACILITATOR_PORT", default_value_t = 3849)]
    pub port: u16,

    /// Escrow adapter contract address. Absent disables escrow mode.
    #[arg(long, env = "X402_ADAPTER_ADDRESS")]
    pub adapter_address: Option<String>,

    /// Treasury address for direct-transfer-mode settlements.
    #[arg(long, env = "X402_API_TREASURY")]
    pub treasury: String,

    /// Price of the protected resource, asset base units.
    #[arg(long, env = "X402_API_PRICE")]
    pub price: String,

    /// Buyer private key for `/x402/demo-ai`. Absent disables the endpoint.
    #[arg(long, env = "DEMO_BUYER_KEY")]
    pub demo_buyer_key: Option<String>,

    /// Seller URL `/x402/demo-ai` drives against.
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Network tag, e.g. `eip155:8453`.
    #[arg(long, env = "X402_NETWORK")]
    pub network: String,

    /// The single supported asset's contract address.
    #[arg(long, env = "X402_ASSET_ADDRESS")]
    pub asset_address: String,

    /// The asset's ticker, reported in `/x402/health`.
    #[arg(long, env = "X402_ASSET_SYMBOL")]
    pub asset_symbol: String,

    /// The asset's decimals.
    #[arg(long, env = "X402_ASSET_DECIMALS")]
    pub asset_decimals: u8,

    /// The asset's on-chain EIP-712 domain name.
    #[arg(long, env = "X402_ASSET_DOMAIN_NAME")]
    pub asset_domain_name: String,

    /// The asset's on-chain EIP-712 domain version.
    #[arg(long, env = "X402_ASSET_DOMAIN_VERSION")]
    pub asset_domain_version: String,
}

/// Fully resolved facilitator configuration: parsed addresses, the closed
/// asset registry, and the loopback bind address (not a knob — spec.md
/// §4.2's "bind only to loopback" is a MUST).
#[derive(Clone)]
pub struct FacilitatorConfig {
    pub rpc_url: String,
    pub relayer_private_key: String,
    pub facilitator_key: String,
    pub bind_host: Ipv4Addr,
    pub port: u16,
    pub adapter_address: Option<Address>,
    pub treasury: Address,
    pub price: String,
    pub demo_buyer_key: Option<String>,
    pub api_url: Option<String>,
    pub network: String,
    pub assets: AssetRegistry,
}

impl FacilitatorConfig {
    /// Resolves CLI args into a validated configuration.
    pub fn from_args(args: FacilitatorArgs) -> Result<Self> {
        let treasury = Address::from_str(&args.treasury)
            .map_err(|e| X402Error::ConfigError(format!("invalid treasury address: {e}")))?;
        let adapter_address = args
            .adapter_address
            .map(|a| {
                Address::from_str(&a)
                    .map_err(|e| X402Error::ConfigError(format!("invalid adapter address: {e}")))
            })
            .transpose()?;
        let asset_address = Address::from_str(&args.asset_address)
            .map_err(|e| X402Error::ConfigError(format!("invalid asset address: {e}")))?;

        let mut assets = AssetRegistry::new();
        assets.insert(AssetDescriptor {
            address: asset_address,
            symbol: args.asset_symbol,
            decimals: args.asset_decimals,
            domain_name: args.asset_domain_name,
            domain_version: args.asset_domain_version,
            eip3009: true,
        });

        Ok(Self {
            rpc_url: args.rpc_url,
            relayer_private_key: args.relayer_private_key,
            facilitator_key: args.facilitator_key,
            bind_host: Ipv4Addr::LOCALHOST,
            port: args.port,
            adapter_address,
            treasury,
            price: args.price,
            demo_buyer_key: args.demo_buyer_key,
            api_url: args.api_url,
            network: args.network,
            assets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> FacilitatorArgs {
        FacilitatorArgs {
            rpc_url: "https://mainnet.base.org".to_string(),
            relayer_private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8"
                .to_string(),
            facilitator_key: "secret".to_string(),
            port: 3849,
            adapter_address: None,
            treasury: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string(),
            price: "10000".to_string(),
            demo_buyer_key: None,
            api_url: None,
            network: "eip155:8453".to_string(),
            asset_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            asset_symbol: "USDC".to_string(),
            asset_decimals: 6,
            asset_domain_name: "USD Coin".to_string(),
            asset_domain_version: "2".to_string(),
        }
    }

    #[test]
    fn resolves_loopback_bind_unconditionally() {
        let config = FacilitatorConfig::from_args(sample_args()).unwrap();
        assert_eq!(config.bind_host, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn registers_the_configured_asset() {
        let config = FacilitatorConfig::from_args(sample_args()).unwrap();
        let asset: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            .parse()
            .unwrap();
        assert!(config.assets.get(&asset).is_some());
    }

    #[test]
    fn rejects_invalid_treasury() {
        let mut args = sample_args();
        args.treasury = "not-an-address".to_string();
        assert!(FacilitatorConfig::from_args(args).is_err());
    }
}
