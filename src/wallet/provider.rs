use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::blockchain::{chains::AddChainParams, models::TransactionPayload};

/// EIP-1193 "user rejected the request".
pub const USER_REJECTED: i64 = 4001;
/// EIP-3326 "unrecognized chain id" from `wallet_switchEthereumChain`.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN
    }
}

/// The wallet capability the client drives. Mirrors the EIP-1193 methods the
/// wallet page calls: `eth_requestAccounts`, `eth_chainId`,
/// `wallet_switchEthereumChain`, `wallet_addEthereumChain`,
/// `eth_sendTransaction`, `personal_sign`, `eth_signTypedData_v4`.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError>;

    /// Returns the transaction hash.
    async fn send_transaction(
        &self,
        from: &str,
        tx: &TransactionPayload,
    ) -> Result<String, ProviderError>;

    async fn personal_sign(&self, message: &str, account: &str) -> Result<String, ProviderError>;

    async fn sign_typed_data(&self, account: &str, typed_data: &Value)
        -> Result<String, ProviderError>;
}
