//! Core type definitions for the x402 v2 protocol.
//!
//! This module contains all the data structures used on the wire: payment
//! requirements, payloads, verification, and settlement types, plus the
//! server-side asset registry that resolves the EIP-712 domain for each
//! supported token.

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::{Result, X402Error};

/// Version of the x402 protocol this crate speaks.
pub const X402_VERSION: u32 = 2;

/// Describes the payment requirements for a specific resource.
///
/// The `PAYMENT-REQUIRED` header carries a base64 JSON **array** of these —
/// never a single object, so that a future server could offer more than one
/// way to pay. This crate only ever offers one.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentRequirements {
    /// Payment scheme. Always `"exact"` in this crate.
    pub scheme: String,

    /// Network tag, e.g. `"eip155:8453"`.
    pub network: String,

    /// Token contract address.
    pub asset: String,

    /// Recipient address for direct transfers, or the escrow adapter in
    /// escrow mode (kept as `pay_to` on the wire regardless of mode, since
    /// the client only ever needs "where does `authorization.to` point").
    #[serde(rename = "payTo")]
    pub pay_to: String,

    /// Amount required, in the asset's smallest unit, as a decimal string.
    pub amount: String,

    /// The resource URL or identifier.
    pub resource: String,

    /// Human-readable description of what the payment is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Maximum time in seconds the signed authorization remains valid for.
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,

    /// Settlement-mode-specific extra data.
    pub extra: RequirementsExtra,
}

/// Settlement mode, tagged so verify/settle can dispatch on one field
/// instead of running two parallel endpoint families.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "settlementMode", rename_all = "lowercase")]
pub enum RequirementsExtra {
    /// Direct EIP-3009 transfer straight to the treasury address.
    Transfer {
        /// EIP-712 domain name of the asset contract.
        name: String,
        /// EIP-712 domain version of the asset contract.
        version: String,
    },
    /// Settlement routed through an escrow adapter contract.
    Escrow {
        /// EIP-712 domain name of the asset contract.
        name: String,
        /// EIP-712 domain version of the asset contract.
        version: String,
        /// Order identifier the escrow adapter keys settlement on.
        #[serde(rename = "orderId")]
        order_id: String,
    },
}

impl RequirementsExtra {
    /// EIP-712 domain name, regardless of settlement mode.
    pub fn name(&self) -> &str {
        match self {
            RequirementsExtra::Transfer { name, .. } => name,
            RequirementsExtra::Escrow { name, .. } => name,
        }
    }

    /// EIP-712 domain version, regardless of settlement mode.
    pub fn version(&self) -> &str {
        match self {
            RequirementsExtra::Transfer { version, .. } => version,
            RequirementsExtra::Escrow { version, .. } => version,
        }
    }

    /// `true` for escrow mode. Every asset this crate serves is EIP-3009
    /// capable by construction (see `AssetRegistry`), so there is no
    /// separate `assetTransferMethod` field to check against.
    pub fn is_escrow(&self) -> bool {
        matches!(self, RequirementsExtra::Escrow { .. })
    }
}

/// EIP-3009 `transferWithAuthorization` authorization, signed by the buyer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Authorization {
    /// Address of the payer (token holder).
    pub from: String,

    /// Address of the payee — the treasury in transfer mode, the escrow
    /// adapter in escrow mode.
    pub to: String,

    /// Amount to transfer, uint256 as a decimal string.
    pub value: String,

    /// Timestamp after which the authorization becomes valid.
    #[serde(rename = "validAfter")]
    pub valid_after: String,

    /// Timestamp after which the authorization is no longer valid.
    #[serde(rename = "validBefore")]
    pub valid_before: String,

    /// Unique nonce for replay protection, 0x + 64 hex chars.
    pub nonce: String,
}

impl Authorization {
    /// Parses `from` into an `Address`.
    pub fn from_address(&self) -> Result<Address> {
        parse_address(&self.from)
    }

    /// Parses `to` into an `Address`.
    pub fn to_address(&self) -> Result<Address> {
        parse_address(&self.to)
    }

    /// Parses `nonce` into a 32-byte digest.
    pub fn nonce_bytes(&self) -> Result<H256> {
        let hex_str = self.nonce.trim_start_matches("0x");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|e| X402Error::InvalidPayload(format!("invalid nonce: {e}")))?;
        Ok(H256::from(bytes))
    }
}

fn parse_address(addr: &str) -> Result<Address> {
    Address::from_str(addr).map_err(|e| X402Error::InvalidAddress(format!("{addr}: {e}")))
}

/// Scheme-specific payload carried inside `PaymentPayload`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExactPayload {
    /// EIP-712 signature, 0x + 130 hex chars (r ‖ s ‖ v).
    pub signature: String,

    /// The authorization the signature covers.
    pub authorization: Authorization,
}

/// Payment payload sent by the client in the `PAYMENT-SIGNATURE` header.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentPayload {
    /// Protocol version. Always 2.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Payment scheme used. Always `"exact"`.
    pub scheme: String,

    /// Network tag, must match the requirements it answers.
    pub network: String,

    /// Scheme-specific payload data.
    pub payload: ExactPayload,
}

/// Request to verify a payment payload against a requirements descriptor.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerificationRequest {
    /// The decoded payment payload.
    #[serde(rename = "paymentPayload")]
    pub payment_payload: PaymentPayload,

    /// The requirements the gate expects this payload to satisfy.
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

/// Response from the facilitator's verify endpoints.
///
/// Always HTTP 200 — `valid: false` carries the structured reason instead of
/// hiding it behind a transport-level error.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerificationResponse {
    /// Whether the payload is valid.
    pub valid: bool,

    /// Human-readable reason, present when `valid` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VerificationResponse {
    /// A passing verification.
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// A failing verification with a reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Request to settle a payment payload on-chain.
///
/// Mirrors `VerificationRequest` — settle does not re-verify, it trusts the
/// caller already ran verify (spec-mandated: see `facilitator::core`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SettlementRequest {
    /// The decoded payment payload.
    #[serde(rename = "paymentPayload")]
    pub payment_payload: PaymentPayload,

    /// The requirements the settlement is honoring.
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

/// Result of a settlement attempt, returned by settle and reflected by the
/// gate in the `PAYMENT-RESPONSE` header.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SettlementResult {
    /// Whether the on-chain transaction confirmed.
    pub success: bool,

    /// Transaction hash, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    /// The payer address, echoed from the authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Scheme used.
    pub scheme: String,

    /// Network tag used.
    pub network: String,

    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Error message, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementResult {
    /// Builds a success result.
    pub fn success(transaction: String, payer: Address, scheme: &str, network: &str) -> Self {
        Self {
            success: true,
            transaction: Some(transaction),
            payer: Some(format!("{payer:?}")),
            scheme: scheme.to_string(),
            network: network.to_string(),
            x402_version: X402_VERSION,
            error: None,
        }
    }

    /// Builds a failure result.
    pub fn failure(error: impl Into<String>, scheme: &str, network: &str) -> Self {
        Self {
            success: false,
            transaction: None,
            payer: None,
            scheme: scheme.to_string(),
            network: network.to_string(),
            x402_version: X402_VERSION,
            error: Some(error.into()),
        }
    }
}

/// Response from the facilitator's `/x402/health` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthResponse {
    /// Relayer address.
    pub relayer: String,

    /// Relayer native-token balance, wei as a decimal string.
    #[serde(rename = "relayerBalance")]
    pub relayer_balance: String,

    /// Configured network tag.
    pub network: String,

    /// Supported assets.
    pub assets: Vec<SupportedAsset>,

    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
}

/// One entry of the `assets` list in `HealthResponse`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SupportedAsset {
    /// Token contract address.
    pub address: String,
    /// Token symbol.
    pub symbol: String,
    /// Whether the token supports EIP-3009.
    pub eip3009: bool,
}

/// Static description of a supported asset, loaded once at facilitator boot.
///
/// The EIP-712 domain name/version live here rather than behind a per-asset
/// hardcoded fallback table — this is the crate's answer to the open
/// question in the original spec about domain mismatches: if an asset isn't
/// listed, it isn't served, full stop.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    /// Token contract address.
    pub address: Address,
    /// Token symbol, for display/health reporting.
    pub symbol: String,
    /// Token decimals.
    pub decimals: u8,
    /// EIP-712 domain name as deployed on-chain.
    pub domain_name: String,
    /// EIP-712 domain version as deployed on-chain.
    pub domain_version: String,
    /// Whether the token implements EIP-3009. Only `true` assets are ever
    /// inserted into an `AssetRegistry` by this crate's loader.
    pub eip3009: bool,
}

/// Closed, process-wide map of supported assets, keyed by contract address.
///
/// Immutable after boot (spec.md §5, "read-only after boot"). Verifying an
/// asset not present here fails immediately with `UnsupportedAsset`, before
/// any chain read is attempted.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<Address, AssetDescriptor>,
}

impl AssetRegistry {
    /// Builds an empty registry.
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    /// Registers an asset, keyed by its contract address.
    pub fn insert(&mut self, descriptor: AssetDescriptor) {
        self.assets.insert(descriptor.address, descriptor);
    }

    /// Looks up an asset by address.
    pub fn get(&self, address: &Address) -> Option<&AssetDescriptor> {
        self.assets.get(address)
    }

    /// Iterates all registered assets, for `/x402/health`.
    pub fn iter(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.values()
    }
}

/// The row the protected-resource layer would write to a persistence table
/// after a successful settle (spec.md §6, "Persistence"). This crate only
/// defines the shape; writing it is an external collaborator's job.
#[derive(Serialize, Debug, Clone)]
pub struct SettlementLogEntry {
    /// Resource endpoint that was paid for.
    pub endpoint: String,
    /// Buyer address.
    pub payer: String,
    /// Asset contract address.
    pub asset: String,
    /// Amount paid, asset base units.
    pub amount: String,
    /// On-chain transaction hash.
    pub tx_hash: String,
}
