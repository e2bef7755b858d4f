//! Thin abstraction over an EVM JSON-RPC endpoint: balance reads, simulated
//! (static) calls, and signed transaction broadcast with receipt wait.
//!
//! Generalizes the teacher's direct `Provider<Http>`/`EIP3009Token` usage in
//! `schemes::exact_evm` behind a trait, so the facilitator core can be
//! tested against a fake chain without touching the network (spec.md §8,
//! invariants 3 and 5).

use crate::errors::{Result, X402Error};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use std::sync::Arc;

abigen!(
    Erc3009Token,
    r#"[
        function transferWithAuthorization(address from, address to, uint256 value, uint256 validAfter, uint256 validBefore, bytes32 nonce, uint8 v, bytes32 r, bytes32 s) external
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool)
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);

/// Read-side chain operations. A trait so facilitator verification logic can
/// run against a mock in unit tests.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// ERC-20 `balanceOf`.
    async fn balance_of(&self, asset: Address, account: Address) -> Result<U256>;

    /// Whether `nonce` has already been consumed by `authorizer` on `asset`.
    async fn authorization_state(&self, asset: Address, authorizer: Address, nonce: H256)
        -> Result<bool>;

    /// Simulates a call without broadcasting, surfacing any revert reason.
    async fn static_call(&self, to: Address, data: Bytes, from: Address) -> Result<Bytes>;

    /// Native-token (e.g. ETH) balance.
    async fn native_balance(&self, account: Address) -> Result<U256>;

    /// Chain ID of the configured RPC endpoint.
    async fn chain_id(&self) -> Result<U256>;
}

/// Write-side chain operations: broadcast and wait for one confirmation.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Broadcasts a transaction from the relayer account and awaits its
    /// receipt. Returns the transaction hash.
    async fn send_tx(&self, to: Address, data: Bytes, gas_limit: U256) -> Result<H256>;

    /// The relayer's own address.
    fn relayer_address(&self) -> Address;
}

/// Concrete chain client: a read-only `Provider<Http>` plus a
/// `SignerMiddleware` holding the relayer's signing context.
pub struct ChainClient {
    provider: Provider<Http>,
    signer: Arc<SignerMiddleware<Provider<Http>, LocalWallet>>,
    relayer: Address,
}

impl ChainClient {
    /// Connects to `rpc_url` and binds the relayer key for signed sends.
    pub async fn connect(rpc_url: &str, relayer_key: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| X402Error::ConfigError(format!("invalid RPC url: {e}")))?;
        let wallet: LocalWallet = relayer_key
            .parse()
            .map_err(|e| X402Error::ConfigError(format!("invalid relayer key: {e}")))?;
        let chain_id = provider.get_chainid().await?;
        let relayer = wallet.address();
        let signer = SignerMiddleware::new(provider.clone(), wallet.with_chain_id(chain_id.as_u64()));
        Ok(Self {
            provider,
            signer: Arc::new(signer),
            relayer,
        })
    }

    fn token(&self, asset: Address) -> Erc3009Token<Provider<Http>> {
        Erc3009Token::new(asset, Arc::new(self.provider.clone()))
    }
}

#[async_trait]
impl ChainReader for ChainClient {
    async fn balance_of(&self, asset: Address, account: Address) -> Result<U256> {
        self.token(asset)
            .balance_of(account)
            .call()
            .await
            .map_err(|e| X402Error::BlockchainError(decode_revert(&e)))
    }

    async fn authorization_state(
        &self,
        asset: Address,
        authorizer: Address,
        nonce: H256,
    ) -> Result<bool> {
        self.token(asset)
            .authorization_state(authorizer, nonce.into())
            .call()
            .await
            .map_err(|e| X402Error::BlockchainError(decode_revert(&e)))
    }

    async fn static_call(&self, to: Address, data: Bytes, from: Address) -> Result<Bytes> {
        let tx = TransactionRequest::new().to(to).from(from).data(data);
        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| X402Error::BlockchainError(decode_revert(&e)))
    }

    async fn native_balance(&self, account: Address) -> Result<U256> {
        Ok(self.provider.get_balance(account, None).await?)
    }

    async fn chain_id(&self) -> Result<U256> {
        Ok(self.provider.get_chainid().await?)
    }
}

#[async_trait]
impl ChainWriter for ChainClient {
    async fn send_tx(&self, to: Address, data: Bytes, gas_limit: U256) -> Result<H256> {
        let tx = TransactionRequest::new()
            .to(to)
            .data(data)
            .gas(gas_limit);

        let pending = self
            .signer
            .send_transaction(tx, None)
            .await
            .map_err(|e| X402Error::SettlementError(e.to_string()))?;

        let receipt = pending
            .await
            .map_err(|e| X402Error::SettlementError(format!("receipt error: {e}")))?
            .ok_or_else(|| X402Error::SettlementError("no receipt".to_string()))?;

        if receipt.status.map(|s| s.is_zero()).unwrap_or(false) {
            return Err(X402Error::SettlementError(
                "transaction reverted".to_string(),
            ));
        }

        Ok(receipt.transaction_hash)
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }
}

fn decode_revert<E: std::fmt::Display>(err: &E) -> String {
    err.to_string()
}

/// In-memory stand-in for on-chain state, used by facilitator core tests so
/// verify/settle logic can be exercised without a live RPC endpoint. Public
/// under `cfg(test)` so `facilitator::core`'s tests can reach it too.
#[cfg(test)]
pub mod mock {
    use super::*;
    use dashmap::DashMap;

    pub struct MockChainClient {
        pub balances: DashMap<(Address, Address), U256>,
        pub used_nonces: DashMap<(Address, Address, H256), bool>,
        pub relayer: Address,
        pub static_call_should_revert: bool,
    }

    impl MockChainClient {
        pub fn new(relayer: Address) -> Self {
            Self {
                balances: DashMap::new(),
                used_nonces: DashMap::new(),
                relayer,
                static_call_should_revert: false,
            }
        }
    }

    #[async_trait]
    impl ChainReader for MockChainClient {
        async fn balance_of(&self, asset: Address, account: Address) -> Result<U256> {
            Ok(self
                .balances
                .get(&(asset, account))
                .map(|v| *v)
                .unwrap_or_default())
        }

        async fn authorization_state(
            &self,
            asset: Address,
            authorizer: Address,
            nonce: H256,
        ) -> Result<bool> {
            Ok(self
                .used_nonces
                .get(&(asset, authorizer, nonce))
                .map(|v| *v)
                .unwrap_or(false))
        }

        async fn static_call(&self, _to: Address, _data: Bytes, _from: Address) -> Result<Bytes> {
            if self.static_call_should_revert {
                Err(X402Error::BlockchainError("execution reverted".to_string()))
            } else {
                Ok(Bytes::default())
            }
        }

        async fn native_balance(&self, _account: Address) -> Result<U256> {
            Ok(U256::from(10u64).pow(U256::from(18u64)))
        }

        async fn chain_id(&self) -> Result<U256> {
            Ok(U256::from(8453u64))
        }
    }

    #[async_trait]
    impl ChainWriter for MockChainClient {
        async fn send_tx(&self, _to: Address, _data: Bytes, _gas_limit: U256) -> Result<H256> {
            Ok(H256::random())
        }

        fn relayer_address(&self) -> Address {
            self.relayer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockChainClient;
    use super::*;

    #[tokio::test]
    async fn mock_balance_defaults_to_zero() {
        let mock = MockChainClient::new(Address::zero());
        let asset = Address::repeat_byte(1);
        let account = Address::repeat_byte(2);
        assert_eq!(mock.balance_of(asset, account).await.unwrap(), U256::zero());
    }

    #[tokio::test]
    async fn mock_nonce_tracking() {
        let mock = MockChainClient::new(Address::zero());
        let asset = Address::repeat_byte(1);
        let from = Address::repeat_byte(2);
        let nonce = H256::random();
        assert!(!mock.authorization_state(asset, from, nonce).await.unwrap());
        mock.used_nonces.insert((asset, from, nonce), true);
        assert!(mock.authorization_state(asset, from, nonce).await.unwrap());
    }
}
