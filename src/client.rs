//! Reference client for the x402 protocol.
//!
//! Drives the full negotiation: send a request, read a 402's
//! `PAYMENT-REQUIRED` header, sign an EIP-3009 authorization for a suitable
//! offer, retry with `PAYMENT-SIGNATURE`, and surface the decoded
//! `PAYMENT-RESPONSE`. Generalizes the teacher's `request_with_payment` flow
//! to v2 headers and `eip712`-based signing instead of the old
//! `schemes::Scheme` dispatch.

use crate::eip712::{self, AuthorizationFields};
use crate::errors::{Result, X402Error};
use crate::types::{
    Authorization, ExactPayload, PaymentPayload, PaymentRequirements, SettlementResult,
    X402_VERSION,
};
use crate::utils::{decode_payment_header, encode_payment_header, generate_nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::U256;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::str::FromStr;

const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";
const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";
const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Validity window granted a freshly signed authorization, seconds.
const AUTHORIZATION_VALIDITY_SECONDS: u64 = 3600;

/// Configuration for x402 client requests.
#[derive(Clone)]
pub struct X402ClientConfig {
    /// Private key of the payer (for signing authorizations).
    pub private_key: String,

    /// Chain ID the signed authorization is scoped to.
    pub chain_id: u64,

    /// HTTP client to use for requests.
    pub http_client: Client,

    /// Preferred network tag (e.g. `"eip155:8453"`). `None` accepts any.
    pub preferred_network: Option<String>,
}

impl X402ClientConfig {
    /// Creates a new client configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_paygate::client::X402ClientConfig;
    ///
    /// let config = X402ClientConfig::new(
    ///     "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8",
    ///     8453,
    /// );
    /// ```
    pub fn new(private_key: impl Into<String>, chain_id: u64) -> Self {
        Self {
            private_key: private_key.into(),
            chain_id,
            http_client: Client::new(),
            preferred_network: None,
        }
    }

    /// Restricts requirement selection to a specific network tag.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    fn wallet(&self) -> Result<LocalWallet> {
        let wallet: LocalWallet = self
            .private_key
            .parse()
            .map_err(|e| X402Error::ConfigError(format!("invalid private key: {e}")))?;
        Ok(wallet.with_chain_id(self.chain_id))
    }
}

/// Outcome of a request driven through the payment negotiation.
pub struct PaidResponse {
    /// The final HTTP response (200 on success).
    pub response: Response,
    /// Decoded `PAYMENT-RESPONSE`, present when the retry carried one.
    pub settlement: Option<SettlementResult>,
}

/// Makes an HTTP request with automatic x402 payment handling.
///
/// If the server responds with 402, this parses `PAYMENT-REQUIRED`, signs a
/// matching authorization, and retries once with `PAYMENT-SIGNATURE`.
pub async fn request_with_payment(
    config: &X402ClientConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<PaidResponse> {
    let mut request = config.http_client.request(method.clone(), url);
    if let Some(body) = &body {
        request = request.json(body);
    }
    let response = request.send().await?;

    if response.status() != StatusCode::PAYMENT_REQUIRED {
        return Ok(PaidResponse {
            response,
            settlement: None,
        });
    }

    let header_value = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .ok_or(X402Error::Not402Response(response.status().as_u16()))?
        .to_str()
        .map_err(|e| X402Error::InvalidPayload(format!("non-ASCII header: {e}")))?
        .to_string();

    let decoded = BASE64.decode(header_value.as_bytes())?;
    let offers: Vec<PaymentRequirements> = serde_json::from_slice(&decoded)?;
    let requirement = select_requirement(&offers, config)?;
    let payload = sign_payment(requirement, config).await?;
    let payment_header = encode_payment_header(&payload)?;

    let mut retry_request = config
        .http_client
        .request(method, url)
        .header(PAYMENT_SIGNATURE_HEADER, payment_header);
    if let Some(body) = body {
        retry_request = retry_request.json(&body);
    }
    let retry_response = retry_request.send().await?;

    let settlement = retry_response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|encoded| decode_settlement_result(encoded).ok());

    Ok(PaidResponse {
        response: retry_response,
        settlement,
    })
}

fn decode_settlement_result(encoded: &str) -> Result<SettlementResult> {
    let decoded = BASE64.decode(encoded.as_bytes())?;
    Ok(serde_json::from_slice(&decoded)?)
}

/// Picks the first offer matching scheme `"exact"` and the configured
/// network (if any). Both settlement modes are signed the same way — an
/// EIP-3009 authorization — so escrow offers are just as acceptable as
/// direct transfers (spec.md §4.5; this crate's escrow assets are always
/// `eip3009`-capable).
fn select_requirement<'a>(
    offers: &'a [PaymentRequirements],
    config: &X402ClientConfig,
) -> Result<&'a PaymentRequirements> {
    offers
        .iter()
        .filter(|r| r.scheme == "exact")
        .find(|r| {
            config
                .preferred_network
                .as_ref()
                .map(|n| n == &r.network)
                .unwrap_or(true)
        })
        .ok_or(X402Error::NoSuitableRequirement)
}

/// Signs an EIP-3009 authorization satisfying `requirement` and wraps it in
/// a `PaymentPayload`.
async fn sign_payment(
    requirement: &PaymentRequirements,
    config: &X402ClientConfig,
) -> Result<PaymentPayload> {
    let wallet = config.wallet()?;
    let asset = crate::utils::parse_address(&requirement.asset)?;
    let to = crate::utils::parse_address(&requirement.pay_to)?;
    let value = U256::from_dec_str(&requirement.amount)
        .map_err(|e| X402Error::InvalidAmount(format!("{}: {e}", requirement.amount)))?;
    let now = crate::utils::current_timestamp();
    let valid_after = U256::zero();
    let valid_before = U256::from(now + AUTHORIZATION_VALIDITY_SECONDS);
    let nonce_hex = generate_nonce();
    let nonce = {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(nonce_hex.trim_start_matches("0x"), &mut bytes)
            .map_err(|e| X402Error::InvalidPayload(format!("nonce: {e}")))?;
        ethers::types::H256::from(bytes)
    };

    let domain = eip712::domain_separator(
        requirement.extra.name(),
        requirement.extra.version(),
        U256::from(config.chain_id),
        asset,
    );
    let fields = AuthorizationFields {
        from: wallet.address(),
        to,
        value,
        valid_after,
        valid_before,
        nonce,
    };
    let digest = eip712::authorization_hash(domain, &fields);
    let signature = wallet
        .sign_hash(digest)
        .map_err(|e| X402Error::SignatureError(e.to_string()))?;

    let mut r_bytes = [0u8; 32];
    signature.r.to_big_endian(&mut r_bytes);
    let mut s_bytes = [0u8; 32];
    signature.s.to_big_endian(&mut s_bytes);
    let mut sig_bytes = Vec::with_capacity(65);
    sig_bytes.extend_from_slice(&r_bytes);
    sig_bytes.extend_from_slice(&s_bytes);
    sig_bytes.push(signature.v as u8);

    Ok(PaymentPayload {
        x402_version: X402_VERSION,
        scheme: requirement.scheme.clone(),
        network: requirement.network.clone(),
        payload: ExactPayload {
            signature: format!("0x{}", hex::encode(sig_bytes)),
            authorization: Authorization {
                from: format!("{:?}", wallet.address()),
                to: format!("{to:?}"),
                value: value.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce: format!("{nonce:?}"),
            },
        },
    })
}

/// Convenience wrapper for GET requests.
pub async fn get(config: &X402ClientConfig, url: &str) -> Result<PaidResponse> {
    request_with_payment(config, Method::GET, url, None).await
}

/// Convenience wrapper for POST requests.
pub async fn post(config: &X402ClientConfig, url: &str, body: Value) -> Result<PaidResponse> {
    request_with_payment(config, Method::POST, url, Some(body)).await
}
