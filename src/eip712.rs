//! EIP-712 typed-data hashing and signature recovery for
//! `TransferWithAuthorization`.
//!
//! Pure functions, no I/O. This is the part of the system both the
//! facilitator (verifying) and the reference client (signing) need, so it
//! lives on its own instead of inside either caller.

use crate::errors::{Result, X402Error};
use crate::types::Authorization;
use ethers::abi::Token;
use ethers::core::utils::keccak256;
use ethers::types::{Address, Signature, H256, U256};

const TRANSFER_WITH_AUTHORIZATION_TYPEHASH: &[u8] =
    b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

const EIP712_DOMAIN_TYPEHASH: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Computes the EIP-712 domain separator for a given asset contract.
///
/// `verifying_contract` is the asset address itself — EIP-3009 tokens sign
/// against their own contract as the domain's verifying contract.
pub fn domain_separator(
    name: &str,
    version: &str,
    chain_id: U256,
    verifying_contract: Address,
) -> H256 {
    let type_hash = keccak256(EIP712_DOMAIN_TYPEHASH);
    H256::from(keccak256(ethers::abi::encode(&[
        Token::FixedBytes(type_hash.to_vec()),
        Token::FixedBytes(keccak256(name.as_bytes()).to_vec()),
        Token::FixedBytes(keccak256(version.as_bytes()).to_vec()),
        Token::Uint(chain_id),
        Token::Address(verifying_contract),
    ])))
}

/// Computes the EIP-712 digest of a `TransferWithAuthorization` message
/// under the given domain separator: `keccak256(0x1901 ‖ domainSeparator ‖
/// structHash)`.
pub fn authorization_hash(domain_separator: H256, auth: &AuthorizationFields) -> H256 {
    let type_hash = keccak256(TRANSFER_WITH_AUTHORIZATION_TYPEHASH);
    let struct_hash = keccak256(ethers::abi::encode(&[
        Token::FixedBytes(type_hash.to_vec()),
        Token::Address(auth.from),
        Token::Address(auth.to),
        Token::Uint(auth.value),
        Token::Uint(auth.valid_after),
        Token::Uint(auth.valid_before),
        Token::FixedBytes(auth.nonce.as_bytes().to_vec()),
    ]));

    let mut message = Vec::with_capacity(2 + 32 + 32);
    message.extend_from_slice(b"\x19\x01");
    message.extend_from_slice(domain_separator.as_bytes());
    message.extend_from_slice(&struct_hash);

    H256::from(keccak256(message))
}

/// The subset of `Authorization` needed for hashing, already parsed into
/// chain-native types (callers hold the string wire form; this keeps the
/// hashing function decoupled from the wire struct's string encoding).
pub struct AuthorizationFields {
    /// Payer address.
    pub from: Address,
    /// Payee address.
    pub to: Address,
    /// Amount, base units.
    pub value: U256,
    /// Start of validity window.
    pub valid_after: U256,
    /// End of validity window.
    pub valid_before: U256,
    /// Replay-protection nonce.
    pub nonce: H256,
}

impl AuthorizationFields {
    /// Parses the wire `Authorization` into chain-native fields.
    pub fn from_authorization(auth: &Authorization) -> Result<Self> {
        Ok(Self {
            from: auth.from_address()?,
            to: auth.to_address()?,
            value: parse_u256(&auth.value)?,
            valid_after: parse_u256(&auth.valid_after)?,
            valid_before: parse_u256(&auth.valid_before)?,
            nonce: auth.nonce_bytes()?,
        })
    }
}

fn parse_u256(s: &str) -> Result<U256> {
    U256::from_dec_str(s).map_err(|e| X402Error::InvalidAmount(format!("{s}: {e}")))
}

/// Recovers the signer address from a 65-byte (r ‖ s ‖ v) signature over a
/// digest. Turns decode/recovery failures into `X402Error::SignatureError`.
pub fn recover_signer(digest: H256, signature_hex: &str) -> Result<Address> {
    let hex_str = signature_hex.trim_start_matches("0x");
    if hex_str.len() != 130 {
        return Err(X402Error::SignatureError(format!(
            "expected 65-byte signature, got {} bytes",
            hex_str.len() / 2
        )));
    }
    let sig_bytes =
        hex::decode(hex_str).map_err(|e| X402Error::SignatureError(format!("invalid hex: {e}")))?;
    let signature = Signature::try_from(sig_bytes.as_slice())?;
    Ok(signature.recover(digest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};

    fn sign(wallet: &LocalWallet, digest: H256) -> String {
        let sig = wallet.sign_hash(digest).unwrap();
        let mut r_bytes = [0u8; 32];
        sig.r.to_big_endian(&mut r_bytes);
        let mut s_bytes = [0u8; 32];
        sig.s.to_big_endian(&mut s_bytes);
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&r_bytes);
        bytes.extend_from_slice(&s_bytes);
        bytes.push(sig.v as u8);
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn recover_matches_signer() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let asset: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            .parse()
            .unwrap();
        let domain = domain_separator("USD Coin", "2", U256::from(8453u64), asset);
        let fields = AuthorizationFields {
            from: wallet.address(),
            to: Address::zero(),
            value: U256::from(1000u64),
            valid_after: U256::zero(),
            valid_before: U256::from(9_999_999_999u64),
            nonce: H256::random(),
        };
        let digest = authorization_hash(domain, &fields);
        let sig = sign(&wallet, digest);

        let recovered = recover_signer(digest, &sig).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn tampered_field_breaks_recovery() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let attacker = LocalWallet::new(&mut rand::thread_rng());
        let asset: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            .parse()
            .unwrap();
        let domain = domain_separator("USD Coin", "2", U256::from(8453u64), asset);
        let fields = AuthorizationFields {
            from: wallet.address(),
            to: Address::zero(),
            value: U256::from(1000u64),
            valid_after: U256::zero(),
            valid_before: U256::from(9_999_999_999u64),
            nonce: H256::random(),
        };
        let digest = authorization_hash(domain, &fields);
        let sig = sign(&wallet, digest);

        // Same signature, but recomputed digest claims a different payer.
        let tampered = AuthorizationFields {
            from: attacker.address(),
            ..fields
        };
        let tampered_digest = authorization_hash(domain, &tampered);
        let recovered = recover_signer(tampered_digest, &sig).unwrap();
        assert_ne!(recovered, attacker.address());
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let digest = H256::random();
        let err = recover_signer(digest, "0xdead").unwrap_err();
        assert!(matches!(err, X402Error::SignatureError(_)));
    }

    #[test]
    fn domain_separator_is_nonzero() {
        let asset: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            .parse()
            .unwrap();
        let domain = domain_separator("USD Coin", "2", U256::from(8453u64), asset);
        assert_ne!(domain, H256::zero());
    }
}
