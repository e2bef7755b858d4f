//! Utility functions for x402 operations.
//!
//! This module provides helper functions for encoding/decoding, conversions,
//! and other common operations used throughout the library.

use crate::errors::{Result, X402Error};
use crate::types::PaymentPayload;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ethers::types::{Address, U256};
use std::str::FromStr;

/// Encodes a `PaymentPayload` as Base64 JSON for the `PAYMENT-SIGNATURE` header.
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes a Base64 JSON `PaymentPayload` from the `PAYMENT-SIGNATURE` header.
pub fn decode_payment_header(encoded: &str) -> Result<PaymentPayload> {
    let decoded = BASE64.decode(encoded.as_bytes())?;
    let json_str = String::from_utf8(decoded)
        .map_err(|e| X402Error::InvalidPayload(format!("Invalid UTF-8: {}", e)))?;
    let payload: PaymentPayload = serde_json::from_str(&json_str)?;
    Ok(payload)
}

/// Converts a string representation of a uint256 to ethers `U256`.
///
/// # Examples
///
/// ```
/// use x402_paygate::utils::string_to_u256;
///
/// let value = string_to_u256("1000000").unwrap();
/// assert_eq!(value, 1000000u64.into());
///
/// let hex_value = string_to_u256("0x0f4240").unwrap();
/// assert_eq!(hex_value, 1000000u64.into());
/// ```
pub fn string_to_u256(s: &str) -> Result<U256> {
    if let Ok(value) = U256::from_dec_str(s) {
        return Ok(value);
    }

    if s.starts_with("0x") || s.starts_with("0X") {
        if let Ok(value) = U256::from_str(s) {
            return Ok(value);
        }
    }

    Err(X402Error::InvalidAmount(format!("Cannot parse '{}' as U256", s)))
}

/// Converts a `U256` to its decimal string representation.
pub fn u256_to_string(value: U256) -> String {
    value.to_string()
}

/// Validates and parses an Ethereum address.
pub fn parse_address(addr: &str) -> Result<Address> {
    Address::from_str(addr).map_err(|e| X402Error::InvalidAddress(format!("{}: {}", addr, e)))
}

/// Generates a random 32-byte nonce for EIP-3009 authorization.
///
/// # Examples
///
/// ```
/// use x402_paygate::utils::generate_nonce;
///
/// let nonce = generate_nonce();
/// assert_eq!(nonce.len(), 66); // "0x" + 64 hex chars
/// ```
pub fn generate_nonce() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let nonce: [u8; 32] = rng.gen();
    format!("0x{}", hex::encode(nonce))
}

/// Converts a dollar amount to the smallest token unit based on decimals.
///
/// # Examples
///
/// ```
/// use x402_paygate::utils::dollar_to_token_amount;
///
/// // $0.01 in USDC (6 decimals, $1 per USDC)
/// let amount = dollar_to_token_amount(0.01, 6, 1.0).unwrap();
/// assert_eq!(amount, "10000");
/// ```
pub fn dollar_to_token_amount(
    dollar_amount: f64,
    decimals: u8,
    token_usd_price: f64,
) -> Result<String> {
    if token_usd_price <= 0.0 {
        return Err(X402Error::InvalidAmount(
            "Token price must be positive".to_string(),
        ));
    }

    let token_amount = dollar_amount / token_usd_price;
    let multiplier = 10f64.powi(decimals as i32);
    let smallest_unit = (token_amount * multiplier).round() as u128;

    Ok(smallest_unit.to_string())
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Checks if `now` falls within `[valid_after, valid_before]`.
pub fn is_timestamp_valid(valid_after: u64, valid_before: u64) -> bool {
    let now = current_timestamp();
    now >= valid_after && now <= valid_before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Authorization, ExactPayload};

    fn sample_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: crate::types::X402_VERSION,
            scheme: "exact".to_string(),
            network: "eip155:8453".to_string(),
            payload: ExactPayload {
                signature: format!("0x{}", "ab".repeat(65)),
                authorization: Authorization {
                    from: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string(),
                    to: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
                    value: "10000".to_string(),
                    valid_after: "0".to_string(),
                    valid_before: "9999999999".to_string(),
                    nonce: format!("0x{}", "cd".repeat(32)),
                },
            },
        }
    }

    #[test]
    fn test_encode_decode_payment_header() {
        let payload = sample_payload();
        let encoded = encode_payment_header(&payload).unwrap();
        let decoded = decode_payment_header(&encoded).unwrap();

        assert_eq!(decoded.scheme, payload.scheme);
        assert_eq!(decoded.network, payload.network);
        assert_eq!(decoded.payload.authorization.nonce, payload.payload.authorization.nonce);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_payment_header("not-valid-base64!!").is_err());
    }

    #[test]
    fn test_string_to_u256() {
        assert_eq!(string_to_u256("1000000").unwrap(), U256::from(1000000u64));
        assert_eq!(string_to_u256("0").unwrap(), U256::zero());
        assert_eq!(string_to_u256("0x0f4240").unwrap(), U256::from(1000000u64));
    }

    #[test]
    fn test_u256_to_string() {
        assert_eq!(u256_to_string(U256::from(1000000u64)), "1000000");
        assert_eq!(u256_to_string(U256::zero()), "0");
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        assert_eq!(format!("{:?}", addr).len() > 0, true);

        let addr2 = parse_address("742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        assert_eq!(addr, addr2);

        assert!(parse_address("invalid").is_err());
    }

    #[test]
    fn test_generate_nonce() {
        let nonce1 = generate_nonce();
        let nonce2 = generate_nonce();

        assert_eq!(nonce1.len(), 66);
        assert!(nonce1.starts_with("0x"));
        assert_ne!(nonce1, nonce2);
    }

    #[test]
    fn test_dollar_to_token_amount() {
        let amount = dollar_to_token_amount(0.01, 6, 1.0).unwrap();
        assert_eq!(amount, "10000");

        let amount = dollar_to_token_amount(1.0, 6, 1.0).unwrap();
        assert_eq!(amount, "1000000");

        let amount = dollar_to_token_amount(0.01, 18, 1.0).unwrap();
        assert_eq!(amount, "10000000000000000");
    }

    #[test]
    fn test_timestamp_validation() {
        let now = current_timestamp();
        assert!(is_timestamp_valid(now - 60, now + 300));
        assert!(!is_timestamp_valid(now + 60, now + 300));
        assert!(!is_timestamp_valid(now - 300, now - 60));
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();
        assert!(ts > 1600000000); // After Sept 2020
        assert!(ts < 2000000000); // Before May 2033
    }
}
