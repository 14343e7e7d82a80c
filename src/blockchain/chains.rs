// src/blockchain/chains.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire name of the "any chain, no switch required" sentinel.
pub const ANY_CHAIN: &str = "any";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported chain '{0}'. Supported: {supported}", supported = Chain::names().join(", "))]
pub struct UnknownChainError(pub String);

/// The closed set of EVM chains the relay can ask a wallet to switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Ethereum,
    Sepolia,
    Base,
    BaseSepolia,
    Optimism,
    Arbitrum,
    Polygon,
}

/// Native currency metadata, as wallets expect it in `wallet_addEthereumChain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters for adding a chain the wallet does not know yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Sepolia,
        Chain::Base,
        Chain::BaseSepolia,
        Chain::Optimism,
        Chain::Arbitrum,
        Chain::Polygon,
    ];

    /// Canonical lower-case name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Sepolia => "sepolia",
            Chain::Base => "base",
            Chain::BaseSepolia => "base-sepolia",
            Chain::Optimism => "optimism",
            Chain::Arbitrum => "arbitrum",
            Chain::Polygon => "polygon",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum Mainnet",
            Chain::Sepolia => "Sepolia Testnet",
            Chain::Base => "Base",
            Chain::BaseSepolia => "Base Sepolia",
            Chain::Optimism => "OP Mainnet",
            Chain::Arbitrum => "Arbitrum One",
            Chain::Polygon => "Polygon PoS",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Sepolia => 11_155_111,
            Chain::Base => 8453,
            Chain::BaseSepolia => 84532,
            Chain::Optimism => 10,
            Chain::Arbitrum => 42161,
            Chain::Polygon => 137,
        }
    }

    /// `0x`-prefixed chain id, the form EIP-1193 providers use.
    pub fn hex_id(&self) -> String {
        format!("{:#x}", self.id())
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://eth.llamarpc.com",
            Chain::Sepolia => "https://rpc.sepolia.org",
            Chain::Base => "https://mainnet.base.org",
            Chain::BaseSepolia => "https://sepolia.base.org",
            Chain::Optimism => "https://mainnet.optimism.io",
            Chain::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Chain::Polygon => "https://polygon-rpc.com",
        }
    }

    pub fn explorer_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://etherscan.io",
            Chain::Sepolia => "https://sepolia.etherscan.io",
            Chain::Base => "https://basescan.org",
            Chain::BaseSepolia => "https://sepolia.basescan.org",
            Chain::Optimism => "https://optimistic.etherscan.io",
            Chain::Arbitrum => "https://arbiscan.io",
            Chain::Polygon => "https://polygonscan.com",
        }
    }

    pub fn native_currency(&self) -> NativeCurrency {
        let (name, symbol) = match self {
            Chain::Polygon => ("POL", "POL"),
            Chain::Sepolia | Chain::BaseSepolia => ("Sepolia Ether", "ETH"),
            _ => ("Ether", "ETH"),
        };
        NativeCurrency {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
        }
    }

    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.hex_id(),
            chain_name: self.display_name().to_string(),
            native_currency: self.native_currency(),
            rpc_urls: vec![self.rpc_url().to_string()],
            block_explorer_urls: vec![self.explorer_url().to_string()],
        }
    }

    pub fn from_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn names() -> Vec<&'static str> {
        Chain::ALL.iter().map(Chain::name).collect()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Normalize common chain aliases users might pass through a tool call
pub fn normalize_chain_name(input: &str) -> String {
    let mut s = input.trim().to_lowercase();
    s = s.replace([' ', '_'], "-");
    while s.contains("--") {
        s = s.replace("--", "-");
    }

    match s.as_str() {
        "mainnet" | "main" | "eth" | "ethereum-mainnet" | "1" => "ethereum".to_string(),
        "testnet" | "test" | "11155111" => "sepolia".to_string(),
        "op" | "optimism-mainnet" | "10" => "optimism".to_string(),
        "arb" | "arbitrum-one" | "42161" => "arbitrum".to_string(),
        "matic" | "polygon-pos" | "137" => "polygon".to_string(),
        "8453" => "base".to_string(),
        "84532" => "base-sepolia".to_string(),
        _ => s,
    }
}

impl FromStr for Chain {
    type Err = UnknownChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_chain_name(s);
        Chain::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| UnknownChainError(s.to_string()))
    }
}

/// Where a signing request should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChainTarget {
    /// Sign on whatever chain the wallet has selected.
    #[default]
    Any,
    Specific(Chain),
}

impl ChainTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTarget::Any => ANY_CHAIN,
            ChainTarget::Specific(chain) => chain.name(),
        }
    }

    pub fn chain(&self) -> Option<Chain> {
        match self {
            ChainTarget::Any => None,
            ChainTarget::Specific(chain) => Some(*chain),
        }
    }
}

impl fmt::Display for ChainTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainTarget {
    type Err = UnknownChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ANY_CHAIN) {
            return Ok(ChainTarget::Any);
        }
        trimmed.parse().map(ChainTarget::Specific)
    }
}
