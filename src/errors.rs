//! Error types for the x402-paygate library.
//!
//! This module defines all error types that can occur during x402 protocol
//! operations, and maps them to HTTP responses at the points the spec treats
//! as trust boundaries (the Gate) vs. the points that stay structured JSON
//! (the facilitator's verify endpoint).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for x402 operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Error during blockchain operations (RPC unreachable, revert, etc.)
    #[error("Blockchain error: {0}")]
    BlockchainError(String),

    /// Malformed payment payload (header didn't decode to valid JSON/shape)
    #[error("Invalid payment payload: {0}")]
    InvalidPayload(String),

    /// Off-chain verification rejected the payload. The string is the
    /// human-readable reason surfaced in `VerificationResponse.reason` and,
    /// from the Gate, in the `X402_VERIFY_FAILED` error body.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// On-chain settlement failed (revert, no receipt, transport failure).
    #[error("Settlement failed: {0}")]
    SettlementError(String),

    /// Scheme named in the payload/requirements isn't one this crate speaks.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Network tag named in the payload doesn't match the configured chain.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Asset address isn't in the configured AssetRegistry.
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Signature did not decode or did not recover to the claimed signer.
    #[error("Invalid signature: {0}")]
    SignatureError(String),

    /// Nonce already used (replay attack prevention, or concurrent settle race).
    #[error("Nonce already used: {0}")]
    NonceUsed(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Configuration error (bad key, missing treasury, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No suitable payment requirement found by the client
    #[error("No suitable payment requirement found")]
    NoSuitableRequirement,

    /// The response was not a 402 Payment Required
    #[error("Expected 402 Payment Required, got status: {0}")]
    Not402Response(u16),

    /// Caller did not present `X-API-Key` / `X-Facilitator-Key`, or it
    /// didn't match the configured shared secret.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request body exceeded the facilitator's size cap.
    #[error("Request body too large")]
    BodyTooLarge,

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias for x402 operations.
pub type Result<T> = std::result::Result<T, X402Error>;

impl From<ethers::core::types::SignatureError> for X402Error {
    fn from(err: ethers::core::types::SignatureError) -> Self {
        X402Error::SignatureError(err.to_string())
    }
}

impl From<ethers::providers::ProviderError> for X402Error {
    fn from(err: ethers::providers::ProviderError) -> Self {
        X402Error::BlockchainError(err.to_string())
    }
}

impl X402Error {
    /// Machine-readable error code from spec §6/§7, used in Gate response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            X402Error::InvalidPayload(_) | X402Error::Base64Error(_) | X402Error::JsonError(_) => {
                "X402_INVALID_PAYLOAD"
            }
            X402Error::VerificationFailed(_)
            | X402Error::SignatureError(_)
            | X402Error::NonceUsed(_)
            | X402Error::UnsupportedAsset(_)
            | X402Error::UnsupportedNetwork(_)
            | X402Error::UnsupportedScheme(_) => "X402_VERIFY_FAILED",
            X402Error::SettlementError(_) | X402Error::BlockchainError(_) => "X402_SETTLE_FAILED",
            X402Error::ConfigError(_) => "SRV_SERVICE_UNAVAILABLE",
            X402Error::Unauthorized => "SRV_SERVICE_UNAVAILABLE",
            X402Error::MissingField(_) => "VAL_REQUIRED_FIELD",
            X402Error::InvalidAddress(_) | X402Error::InvalidAmount(_) => "VAL_INVALID_FORMAT",
            _ => "X402_INVALID_PAYLOAD",
        }
    }
}

/// Maps a Gate-side error to the HTTP status/code/body table in spec §7.
///
/// Only used by the Gate. The facilitator's `/verify` endpoint never
/// produces one of these — it always answers 200 with `{valid:false,
/// reason}` per spec §4.2, so the structured reason doesn't hide behind a
/// transport-level status code.
impl IntoResponse for X402Error {
    fn into_response(self) -> Response {
        let status = match &self {
            X402Error::InvalidPayload(_) | X402Error::Base64Error(_) | X402Error::JsonError(_) => {
                StatusCode::BAD_REQUEST
            }
            X402Error::VerificationFailed(_)
            | X402Error::SignatureError(_)
            | X402Error::NonceUsed(_)
            | X402Error::UnsupportedAsset(_)
            | X402Error::UnsupportedNetwork(_)
            | X402Error::UnsupportedScheme(_) => StatusCode::PAYMENT_REQUIRED,
            X402Error::SettlementError(_) | X402Error::BlockchainError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            X402Error::ConfigError(_) => StatusCode::SERVICE_UNAVAILABLE,
            X402Error::Unauthorized => StatusCode::UNAUTHORIZED,
            X402Error::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            X402Error::MissingField(_) | X402Error::InvalidAddress(_) | X402Error::InvalidAmount(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
