//! Network definitions and known USDC deployments.
//!
//! Every escrow operation signs an ERC-3009 authorization against the USDC
//! contract of the target chain, so the EIP-712 domain (name and version)
//! is part of the network definition. The name differs between chains:
//! Circle ships "USDC" on some deployments and "USD Coin" on others.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::caip2::Caip2NetworkId;

/// Supported EVM networks.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Network {
    /// Ethereum mainnet (chain ID 1).
    #[serde(rename = "ethereum")]
    Ethereum,
    /// Ethereum Sepolia testnet (chain ID 11155111).
    #[serde(rename = "ethereum-sepolia")]
    EthereumSepolia,
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Polygon mainnet (chain ID 137).
    #[serde(rename = "polygon")]
    Polygon,
    /// Arbitrum One (chain ID 42161).
    #[serde(rename = "arbitrum")]
    Arbitrum,
    /// Optimism mainnet (chain ID 10).
    #[serde(rename = "optimism")]
    Optimism,
    /// Avalanche C-Chain (chain ID 43114).
    #[serde(rename = "avalanche")]
    Avalanche,
    /// Celo mainnet (chain ID 42220).
    #[serde(rename = "celo")]
    Celo,
    /// HyperEVM mainnet (chain ID 999).
    #[serde(rename = "hyperevm")]
    HyperEvm,
    /// Unichain mainnet (chain ID 130).
    #[serde(rename = "unichain")]
    Unichain,
    /// Monad mainnet (chain ID 143).
    #[serde(rename = "monad")]
    Monad,
    /// BNB Smart Chain (chain ID 56). Its USDC is a bridged token without ERC-3009.
    #[serde(rename = "bsc")]
    Bsc,
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Network::variants()
            .iter()
            .copied()
            .find(|n| n.as_str() == lowered)
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::Ethereum,
            Network::EthereumSepolia,
            Network::Base,
            Network::BaseSepolia,
            Network::Polygon,
            Network::Arbitrum,
            Network::Optimism,
            Network::Avalanche,
            Network::Celo,
            Network::HyperEvm,
            Network::Unichain,
            Network::Monad,
            Network::Bsc,
        ]
    }

    /// Lowercase identifier, also used as the `RPC_URL_<NETWORK>` suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::EthereumSepolia => "ethereum-sepolia",
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::Polygon => "polygon",
            Network::Arbitrum => "arbitrum",
            Network::Optimism => "optimism",
            Network::Avalanche => "avalanche",
            Network::Celo => "celo",
            Network::HyperEvm => "hyperevm",
            Network::Unichain => "unichain",
            Network::Monad => "monad",
            Network::Bsc => "bsc",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::EthereumSepolia => 11155111,
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
            Network::Polygon => 137,
            Network::Arbitrum => 42161,
            Network::Optimism => 10,
            Network::Avalanche => 43114,
            Network::Celo => 42220,
            Network::HyperEvm => 999,
            Network::Unichain => 130,
            Network::Monad => 143,
            Network::Bsc => 56,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Network::variants()
            .iter()
            .copied()
            .find(|n| n.chain_id() == chain_id)
    }

    /// Human readable chain name, as listed in unsupported-chain errors.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum Mainnet",
            Network::EthereumSepolia => "Ethereum Sepolia",
            Network::Base => "Base Mainnet",
            Network::BaseSepolia => "Base Sepolia",
            Network::Polygon => "Polygon",
            Network::Arbitrum => "Arbitrum",
            Network::Optimism => "Optimism",
            Network::Avalanche => "Avalanche",
            Network::Celo => "Celo",
            Network::HyperEvm => "HyperEVM",
            Network::Unichain => "Unichain",
            Network::Monad => "Monad",
            Network::Bsc => "BNB Smart Chain",
        }
    }

    /// Returns true if this network is a testnet environment.
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::BaseSepolia | Network::EthereumSepolia)
    }

    pub fn caip2(&self) -> Caip2NetworkId {
        Caip2NetworkId::eip155(self.chain_id())
    }

    /// Public RPC endpoint used when no `RPC_URL_*` override is configured.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Ethereum => "https://eth.llamarpc.com",
            Network::EthereumSepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
            Network::Polygon => "https://polygon-rpc.com",
            Network::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Network::Optimism => "https://mainnet.optimism.io",
            Network::Avalanche => "https://avalanche-c-chain-rpc.publicnode.com",
            Network::Celo => "https://forno.celo.org",
            Network::HyperEvm => "https://rpc.hyperliquid.xyz/evm",
            Network::Unichain => "https://unichain-rpc.publicnode.com",
            Network::Monad => "https://rpc.monad.xyz",
            Network::Bsc => "https://binance.llamarpc.com",
        }
    }

    /// Known USDC deployment on this network.
    pub fn usdc(&self) -> &'static UsdcDeployment {
        match self {
            Network::Ethereum => &USDC_ETHEREUM,
            Network::EthereumSepolia => &USDC_ETHEREUM_SEPOLIA,
            Network::Base => &USDC_BASE,
            Network::BaseSepolia => &USDC_BASE_SEPOLIA,
            Network::Polygon => &USDC_POLYGON,
            Network::Arbitrum => &USDC_ARBITRUM,
            Network::Optimism => &USDC_OPTIMISM,
            Network::Avalanche => &USDC_AVALANCHE,
            Network::Celo => &USDC_CELO,
            Network::HyperEvm => &USDC_HYPEREVM,
            Network::Unichain => &USDC_UNICHAIN,
            Network::Monad => &USDC_MONAD,
            Network::Bsc => &USDC_BSC,
        }
    }
}

/// EIP-712 domain parameters of a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEip712 {
    pub name: &'static str,
    pub version: &'static str,
}

/// A USDC contract on a specific network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcDeployment {
    pub address: Address,
    pub decimals: u8,
    pub eip712: TokenEip712,
    /// Whether the token implements `receiveWithAuthorization`.
    pub supports_erc3009: bool,
}

const USD_COIN: TokenEip712 = TokenEip712 {
    name: "USD Coin",
    version: "2",
};

const USDC: TokenEip712 = TokenEip712 {
    name: "USDC",
    version: "2",
};

static USDC_ETHEREUM: UsdcDeployment = UsdcDeployment {
    address: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_ETHEREUM_SEPOLIA: UsdcDeployment = UsdcDeployment {
    address: address!("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_BASE: UsdcDeployment = UsdcDeployment {
    address: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_BASE_SEPOLIA: UsdcDeployment = UsdcDeployment {
    address: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_POLYGON: UsdcDeployment = UsdcDeployment {
    address: address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_ARBITRUM: UsdcDeployment = UsdcDeployment {
    address: address!("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_OPTIMISM: UsdcDeployment = UsdcDeployment {
    address: address!("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_AVALANCHE: UsdcDeployment = UsdcDeployment {
    address: address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
    decimals: 6,
    eip712: USD_COIN,
    supports_erc3009: true,
};

static USDC_CELO: UsdcDeployment = UsdcDeployment {
    address: address!("0xcebA9300f2b948710d2653dD7B07f33A8B32118C"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_HYPEREVM: UsdcDeployment = UsdcDeployment {
    address: address!("0xb88339CB7199b77E23DB6E890353E22632Ba630f"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_UNICHAIN: UsdcDeployment = UsdcDeployment {
    address: address!("0x078D782b760474a361dDA0AF3839290b0EF57AD6"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_MONAD: UsdcDeployment = UsdcDeployment {
    address: address!("0x754704Bc059F8C67012fEd69BC8A327a5aafb603"),
    decimals: 6,
    eip712: USDC,
    supports_erc3009: true,
};

static USDC_BSC: UsdcDeployment = UsdcDeployment {
    address: address!("0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
    decimals: 18,
    eip712: USD_COIN,
    supports_erc3009: false,
};
