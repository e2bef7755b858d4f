//! # x402-paygate
//!
//! Seller-side mediation for the x402 v2 HTTP micropayment protocol on EVM
//! chains: a Payment Gate that turns a 402 negotiation into a settled
//! on-chain transfer, and a Facilitator service that holds the relayer key
//! and talks to the chain on the seller's behalf.
//!
//! ## Components
//!
//! - [`eip712`] — pure EIP-712 typed-data hashing and ECDSA recovery for
//!   `TransferWithAuthorization`.
//! - [`chain`] — thin JSON-RPC wrapper: balance reads, static-call
//!   simulation, and signed transaction broadcast.
//! - [`facilitator`] — the verify/settle algorithm, its HTTP surface, and
//!   process configuration. Holds the relayer key; binds loopback-only.
//! - [`gate`] — `tower` middleware wrapping a protected resource handler,
//!   mediating payment via a local facilitator.
//! - [`client`] — reference client: parses `PAYMENT-REQUIRED`, signs an
//!   authorization, retries with `PAYMENT-SIGNATURE`.
//! - [`types`] — wire types shared by every component.
//!
//! ## Protocol flow
//!
//! 1. **Client requests a protected resource.** Standard HTTP request.
//! 2. **Gate responds 402** with `PAYMENT-REQUIRED: base64(json([requirements]))`.
//! 3. **Client signs an EIP-3009 authorization** and retries with
//!    `PAYMENT-SIGNATURE: base64(json(payload))`.
//! 4. **Gate asks the facilitator to verify**, then to settle on-chain.
//! 5. **Gate responds 200** with `PAYMENT-RESPONSE: base64(json(settlementResult))`
//!    and forwards the request to the protected handler.
//!
//! ## References
//!
//! - [x402 Specification](https://github.com/coinbase/x402)
//! - [EIP-3009](https://eips.ethereum.org/EIPS/eip-3009)
//! - [EIP-712](https://eips.ethereum.org/EIPS/eip-712)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod chain;
pub mod client;
pub mod eip712;
pub mod errors;
pub mod facilitator;
pub mod gate;
pub mod sig_down;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use errors::{Result, X402Error};
pub use types::{
    Authorization, ExactPayload, HealthResponse, PaymentPayload, PaymentRequirements,
    RequirementsExtra, SettlementRequest, SettlementResult, VerificationRequest,
    VerificationResponse, X402_VERSION,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(X402_VERSION, 2);
    }

    #[test]
    fn test_modules_are_public() {
        let _ = client::X402ClientConfig::new("0xkey", 8453);
        let _ = gate::facilitator_client::FacilitatorClient::new("http://127.0.0.1:3849", "secret");
    }
}
