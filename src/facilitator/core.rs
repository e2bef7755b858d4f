//! Verify/settle algorithm, dispatched on `RequirementsExtra`'s tag instead
//! of running two parallel endpoint families underneath (spec.md §9,
//! "Settlement modes as tagged variants").

use crate::chain::{ChainReader, ChainWriter};
use crate::eip712::{self, AuthorizationFields};
use crate::errors::{Result, X402Error};
use crate::facilitator::config::FacilitatorConfig;
use crate::types::{
    Authorization, HealthResponse, PaymentPayload, RequirementsExtra, SettlementResult,
    SupportedAsset, VerificationResponse, X402_VERSION,
};
use dashmap::DashSet;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};
use std::str::FromStr;
use std::sync::Arc;

/// Gas limit for a direct EIP-3009 transfer (spec.md §4.2).
const TRANSFER_GAS_LIMIT: u64 = 200_000;
/// Gas limit for an escrow-routed settlement (spec.md §4.2).
const ESCROW_GAS_LIMIT: u64 = 500_000;
/// Below this native balance, `/x402/health` logs a warning instead of
/// failing the request (spec.md §4.2, "Low-balance warnings are logged, not
/// returned") — 0.01 native token, 18-decimal wei.
const LOW_RELAYER_BALANCE_WEI: u64 = 10_000_000_000_000_000;

/// Holds the chain handle and the process-wide fast-path nonce cache.
///
/// The nonce set is an optimization only — the real uniqueness guarantee is
/// the on-chain EIP-3009 bitmap (spec.md §3) queried via
/// `ChainReader::authorization_state`. Swapped in for the teacher's
/// `tokio::sync::RwLock<HashSet<String>>` because this corpus reaches for
/// `dashmap` for exactly this kind of concurrent nonce map.
pub struct FacilitatorCore<C: ChainReader + ChainWriter> {
    chain: Arc<C>,
    config: FacilitatorConfig,
    settled_nonces: DashSet<H256>,
}

impl<C: ChainReader + ChainWriter> FacilitatorCore<C> {
    /// Builds a new core over a chain handle and resolved configuration.
    pub fn new(chain: Arc<C>, config: FacilitatorConfig) -> Self {
        Self {
            chain,
            config,
            settled_nonces: DashSet::new(),
        }
    }

    /// Runs the eleven-step verify algorithm from spec.md §4.2, failing on
    /// the first unmet check. Never returns `Err` to the caller — a failed
    /// check is `VerificationResponse::fail`, keeping the reason channel
    /// structured instead of hiding behind a transport error.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
    ) -> VerificationResponse {
        match self.verify_inner(payload, requirements).await {
            Ok(()) => VerificationResponse::ok(),
            Err(X402Error::NonceUsed(reason)) => {
                tracing::warn!(
                    payer = %payload.payload.authorization.from,
                    nonce = %truncated(&payload.payload.authorization.nonce),
                    "nonce reuse rejected"
                );
                VerificationResponse::fail(reason)
            }
            Err(e) => {
                tracing::warn!(
                    payer = %payload.payload.authorization.from,
                    reason = %e,
                    "payment verification rejected"
                );
                VerificationResponse::fail(e.to_string())
            }
        }
    }

    async fn verify_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
    ) -> Result<()> {
        // 1. protocol version
        if payload.x402_version != X402_VERSION {
            return Err(X402Error::UnsupportedScheme(format!(
                "unsupported x402 version {}",
                payload.x402_version
            )));
        }
        // 2. scheme
        if payload.scheme != "exact" {
            return Err(X402Error::UnsupportedScheme(payload.scheme.clone()));
        }
        // 3. network
        if payload.network != self.config.network {
            return Err(X402Error::UnsupportedNetwork(format!(
                "wrong network: expected {}, got {}",
                self.config.network, payload.network
            )));
        }

        // 4. asset must be registered and eip3009-capable
        let asset_addr = Address::from_str(&requirements.asset)
            .map_err(|e| X402Error::InvalidAddress(format!("{}: {e}", requirements.asset)))?;
        let asset = self
            .config
            .assets
            .get(&asset_addr)
            .filter(|a| a.eip3009)
            .ok_or_else(|| X402Error::UnsupportedAsset(requirements.asset.clone()))?;

        // 5. mode discriminator
        let auth = &payload.payload.authorization;
        match &requirements.extra {
            RequirementsExtra::Transfer { .. } => {}
            RequirementsExtra::Escrow { .. } => {
                if self.config.adapter_address.is_none() {
                    return Err(X402Error::ConfigError(
                        "escrow mode requested but no adapter configured".to_string(),
                    ));
                }
            }
        }

        let from = auth.from_address()?;
        let to = auth.to_address()?;
        let value = parse_u256(&auth.value)?;
        let valid_after = parse_u256(&auth.valid_after)?;
        let valid_before = parse_u256(&auth.valid_before)?;
        let nonce = auth.nonce_bytes()?;

        // 6. EIP-712 recovery
        let domain = eip712::domain_separator(
            &requirements.extra.name().to_string(),
            &requirements.extra.version().to_string(),
            self.chain.chain_id().await?,
            asset_addr,
        );
        let fields = AuthorizationFields {
            from,
            to,
            value,
            valid_after,
            valid_before,
            nonce,
        };
        let digest = eip712::authorization_hash(domain, &fields);
        let recovered = eip712::recover_signer(digest, &payload.payload.signature)?;
        if recovered != from {
            return Err(X402Error::VerificationFailed("Invalid signature".to_string()));
        }

        // 7. destination check. Transfer mode must pay the facilitator's own
        // configured treasury, not whatever `pay_to` the caller's requirements
        // happen to claim — otherwise a malicious resource server could
        // point payment at an address the facilitator never agreed to.
        let expected_to = match &requirements.extra {
            RequirementsExtra::Transfer { .. } => {
                let claimed_to = Address::from_str(&requirements.pay_to)
                    .map_err(|e| X402Error::InvalidAddress(format!("{e}")))?;
                if claimed_to != self.config.treasury {
                    return Err(X402Error::VerificationFailed(
                        "Wrong payment destination".to_string(),
                    ));
                }
                self.config.treasury
            }
            RequirementsExtra::Escrow { .. } => self
                .config
                .adapter_address
                .expect("checked present above"),
        };
        if to != expected_to {
            return Err(X402Error::VerificationFailed(
                "Wrong payment destination".to_string(),
            ));
        }

        // 8. balance check
        let balance = self.chain.balance_of(asset_addr, from).await?;
        if balance < value {
            return Err(X402Error::VerificationFailed(
                "Insufficient balance".to_string(),
            ));
        }

        // 9. time window
        let now = U256::from(crate::utils::current_timestamp());
        if now < valid_after || now > valid_before {
            return Err(X402Error::VerificationFailed(
                "Authorization expired or not yet valid".to_string(),
            ));
        }

        // 10. amount. The requirements must themselves ask for at least the
        // facilitator's configured price floor, and the signed value must
        // cover the requirements — otherwise a resource server could offer
        // a too-cheap price and still get it settled.
        let required = parse_u256(&requirements.amount)?;
        let price_floor = parse_u256(&self.config.price)?;
        if required < price_floor {
            return Err(X402Error::VerificationFailed(
                "Insufficient amount".to_string(),
            ));
        }
        if value < required {
            return Err(X402Error::VerificationFailed(
                "Insufficient amount".to_string(),
            ));
        }

        // nonce already-used check, ahead of the escrow simulate so a stale
        // replay never reaches a static call.
        if self.settled_nonces.contains(&nonce)
            || self.chain.authorization_state(asset_addr, from, nonce).await?
        {
            return Err(X402Error::NonceUsed(format!(
                "nonce {} already used",
                auth.nonce
            )));
        }

        // 11. escrow-only static-call simulation
        if let RequirementsExtra::Escrow { order_id, .. } = &requirements.extra {
            let adapter = self.config.adapter_address.expect("checked above");
            let (v, r, s) = split_signature(&payload.payload.signature)?;
            let order_id_bytes = parse_bytes32(order_id)?;
            let call_data = encode_settle_payment(
                asset_addr,
                order_id_bytes,
                from,
                value,
                valid_after,
                valid_before,
                nonce,
                v,
                r,
                s,
            );
            self.chain
                .static_call(adapter, call_data, self.chain.relayer_address())
                .await
                .map_err(|e| X402Error::VerificationFailed(e.to_string()))?;
        }

        let _ = asset; // only needed to confirm eip3009-capability above
        Ok(())
    }

    /// Broadcasts the settlement. Does not re-run verify — callers are
    /// required to have just called `verify` (spec.md §4.2).
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
    ) -> SettlementResult {
        match self.settle_inner(payload, requirements).await {
            Ok(tx_hash) => {
                let from = payload
                    .payload
                    .authorization
                    .from_address()
                    .unwrap_or_default();
                tracing::info!(payer = %payload.payload.authorization.from, tx = %tx_hash, "settlement confirmed");
                SettlementResult::success(tx_hash, from, &payload.scheme, &payload.network)
            }
            Err(e) => {
                tracing::error!(payer = %payload.payload.authorization.from, error = %e, "settlement failed");
                SettlementResult::failure(e.to_string(), &payload.scheme, &payload.network)
            }
        }
    }

    async fn settle_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
    ) -> Result<String> {
        let auth = &payload.payload.authorization;
        let asset_addr = Address::from_str(&requirements.asset)
            .map_err(|e| X402Error::InvalidAddress(format!("{e}")))?;
        let from = auth.from_address()?;
        let to = auth.to_address()?;
        let value = parse_u256(&auth.value)?;
        let valid_after = parse_u256(&auth.valid_after)?;
        let valid_before = parse_u256(&auth.valid_before)?;
        let nonce = auth.nonce_bytes()?;
        let (v, r, s) = split_signature(&payload.payload.signature)?;

        let (to_contract, data, gas_limit) = match &requirements.extra {
            RequirementsExtra::Transfer { .. } => {
                let data = encode_transfer_with_authorization(
                    from,
                    to,
                    value,
                    valid_after,
                    valid_before,
                    nonce,
                    v,
                    r,
                    s,
                );
                (asset_addr, data, U256::from(TRANSFER_GAS_LIMIT))
            }
            RequirementsExtra::Escrow { order_id, .. } => {
                let adapter = self.config.adapter_address.ok_or_else(|| {
                    X402Error::ConfigError("escrow mode but no adapter configured".to_string())
                })?;
                let order_id_bytes = parse_bytes32(order_id)?;
                let data = encode_settle_payment(
                    asset_addr,
                    order_id_bytes,
                    from,
                    value,
                    valid_after,
                    valid_before,
                    nonce,
                    v,
                    r,
                    s,
                );
                (adapter, data, U256::from(ESCROW_GAS_LIMIT))
            }
        };

        let tx_hash = self.chain.send_tx(to_contract, data, gas_limit).await?;
        self.settled_nonces.insert(nonce);
        Ok(format!("{tx_hash:?}"))
    }

    /// `/x402/health`: relayer identity, native balance, supported assets.
    /// Low-balance warnings are logged by the caller, not returned here
    /// (spec.md §4.2).
    pub async fn health(&self) -> Result<HealthResponse> {
        let relayer = self.chain.relayer_address();
        let balance = self.chain.native_balance(relayer).await?;
        if balance < U256::from(LOW_RELAYER_BALANCE_WEI) {
            tracing::warn!(relayer = %format!("{relayer:?}"), balance = %balance, "relayer native balance running low");
        }
        let assets = self
            .config
            .assets
            .iter()
            .map(|a| SupportedAsset {
                address: format!("{:?}", a.address),
                symbol: a.symbol.clone(),
                eip3009: a.eip3009,
            })
            .collect();
        Ok(HealthResponse {
            relayer: format!("{relayer:?}"),
            relayer_balance: balance.to_string(),
            network: self.config.network.clone(),
            assets,
            x402_version: X402_VERSION,
        })
    }

    /// Read access to the resolved configuration, used by the HTTP layer and
    /// the demo-ai handler.
    pub fn config(&self) -> &FacilitatorConfig {
        &self.config
    }

    /// Chain ID of the configured RPC endpoint, needed by `/x402/demo-ai` to
    /// build its own client-side signer (spec.md §4.2, "Demo-AI").
    pub async fn chain_id_for_demo(&self) -> Result<u64> {
        Ok(self.chain.chain_id().await?.as_u64())
    }
}

/// First 10 characters of a hex string, for log lines that shouldn't spell
/// out a full 32-byte nonce.
fn truncated(s: &str) -> &str {
    &s[..s.len().min(10)]
}

fn parse_u256(s: &str) -> Result<U256> {
    U256::from_dec_str(s).map_err(|e| X402Error::InvalidAmount(format!("{s}: {e}")))
}

fn parse_bytes32(s: &str) -> Result<H256> {
    let hex_str = s.trim_start_matches("0x");
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut bytes)
        .map_err(|e| X402Error::InvalidPayload(format!("invalid order id: {e}")))?;
    Ok(H256::from(bytes))
}

fn split_signature(signature_hex: &str) -> Result<(u8, H256, H256)> {
    let hex_str = signature_hex.trim_start_matches("0x");
    let bytes = hex::decode(hex_str)
        .map_err(|e| X402Error::SignatureError(format!("invalid hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(X402Error::SignatureError(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }
    let r = H256::from_slice(&bytes[0..32]);
    let s = H256::from_slice(&bytes[32..64]);
    let v = bytes[64];
    Ok((v, r, s))
}

#[allow(clippy::too_many_arguments)]
fn encode_transfer_with_authorization(
    from: Address,
    to: Address,
    value: U256,
    valid_after: U256,
    valid_before: U256,
    nonce: H256,
    v: u8,
    r: H256,
    s: H256,
) -> Bytes {
    let selector = ethers::utils::id(
        "transferWithAuthorization(address,address,uint256,uint256,uint256,bytes32,uint8,bytes32,bytes32)",
    );
    let params = ethers::abi::encode(&[
        Token::Address(from),
        Token::Address(to),
        Token::Uint(value),
        Token::Uint(valid_after),
        Token::Uint(valid_before),
        Token::FixedBytes(nonce.as_bytes().to_vec()),
        Token::Uint(U256::from(v)),
        Token::FixedBytes(r.as_bytes().to_vec()),
        Token::FixedBytes(s.as_bytes().to_vec()),
    ]);
    let mut data = selector.to_vec();
    data.extend_from_slice(&params);
    Bytes::from(data)
}

#[allow(clippy::too_many_arguments)]
fn encode_settle_payment(
    asset: Address,
    order_id: H256,
    from: Address,
    value: U256,
    valid_after: U256,
    valid_before: U256,
    nonce: H256,
    v: u8,
    r: H256,
    s: H256,
) -> Bytes {
    let selector = ethers::utils::id(
        "settlePayment(address,bytes32,address,uint256,uint256,uint256,bytes32,uint8,bytes32,bytes32)",
    );
    let params = ethers::abi::encode(&[
        Token::Address(asset),
        Token::FixedBytes(order_id.as_bytes().to_vec()),
        Token::Address(from),
        Token::Uint(value),
        Token::Uint(valid_after),
        Token::Uint(valid_before),
        Token::FixedBytes(nonce.as_bytes().to_vec()),
        Token::Uint(U256::from(v)),
        Token::FixedBytes(r.as_bytes().to_vec()),
        Token::FixedBytes(s.as_bytes().to_vec()),
    ]);
    let mut data = selector.to_vec();
    data.extend_from_slice(&params);
    Bytes::from(data)
}
