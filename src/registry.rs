//! Escrow contract deployments per chain.
//!
//! Each supported chain has a fixed set of commerce-payments contracts: the
//! shared `AuthCaptureEscrow`, the `PaymentOperatorFactory` that deploys
//! operator instances, the ERC-3009 token collector, the protocol fee config,
//! the refund-request contract and the USDC token the escrow settles in.
//!
//! The registry only knows operator factories. Callers deploy their own
//! `PaymentOperator` through the factory and pass its address in; Base mainnet
//! keeps the legacy operator instance as a default.

use alloy::primitives::{address, Address};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::network::{Network, TokenEip712};

/// Contract addresses deployed on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSet {
    pub escrow: Address,
    pub operator_factory: Address,
    pub token_collector: Address,
    pub protocol_fee_config: Address,
    pub refund_request: Address,
    pub token: Address,
}

/// PaymentOperator instance deployed on Base mainnet before the factory existed.
pub const LEGACY_BASE_OPERATOR: Address = address!("0xa06958D93135BEd7e43893897C0d9fA931EF051C");

/// Chain id of Base mainnet, the only chain with a default operator instance.
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;

/// Contracts shared by Arbitrum, Celo, Monad and Avalanche (CREATE2 deployments).
const fn create2_set(token: Address) -> ContractSet {
    ContractSet {
        escrow: address!("0x320a3c35F131E5D2Fb36af56345726B298936037"),
        operator_factory: address!("0x32d6AC59BCe8DFB3026F10BcaDB8D00AB218f5b6"),
        token_collector: address!("0x230fd3A171750FA45db2976121376b7F47Cba308"),
        protocol_fee_config: address!("0xD979dBfBdA5f4b16AAF60Eaab32A44f352076838"),
        refund_request: address!("0xc1256Bb30bd0cdDa07D8C8Cf67a59105f2EA1b98"),
        token,
    }
}

/// Built once, never mutated.
static ESCROW_CONTRACTS: Lazy<BTreeMap<u64, ContractSet>> = Lazy::new(|| {
    let mut m = BTreeMap::new();
    m.insert(
        84532,
        ContractSet {
            escrow: address!("0x29025c0E9D4239d438e169570818dB9FE0A80873"),
            operator_factory: address!("0x97d53e63A9CB97556c00BeFd325AF810c9b267B2"),
            token_collector: address!("0x5cA789000070DF15b4663DB64a50AeF5D49c5Ee0"),
            protocol_fee_config: address!("0x8F96C493bAC365E41f0315cf45830069EBbDCaCe"),
            refund_request: address!("0x1C2Ab244aC8bDdDB74d43389FF34B118aF2E90F4"),
            token: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        },
    );
    m.insert(
        11155111,
        ContractSet {
            escrow: address!("0x320a3c35F131E5D2Fb36af56345726B298936037"),
            operator_factory: address!("0x32d6AC59BCe8DFB3026F10BcaDB8D00AB218f5b6"),
            token_collector: address!("0x230fd3A171750FA45db2976121376b7F47Cba308"),
            protocol_fee_config: address!("0xD979dBfBdA5f4b16AAF60Eaab32A44f352076838"),
            refund_request: address!("0xc1256Bb30bd0cdDa07D8C8Cf67a59105f2EA1b98"),
            token: address!("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
        },
    );
    m.insert(
        BASE_MAINNET_CHAIN_ID,
        ContractSet {
            escrow: address!("0xb9488351E48b23D798f24e8174514F28B741Eb4f"),
            operator_factory: address!("0x3D0837fF8Ea36F417261577b9BA568400A840260"),
            token_collector: address!("0x48ADf6E37F9b31dC2AAD0462C5862B5422C736B8"),
            protocol_fee_config: address!("0x59314674BAbb1a24Eb2704468a9cCdD50668a1C6"),
            refund_request: address!("0x35fb2EFEfAc3Ee9f6E52A9AAE5C9655bC08dEc00"),
            token: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        },
    );
    m.insert(
        1,
        ContractSet {
            escrow: address!("0xc1256Bb30bd0cdDa07D8C8Cf67a59105f2EA1b98"),
            operator_factory: address!("0xed02d3E5167BCc9582D851885A89b050AB816a56"),
            token_collector: address!("0xE78648e7af7B1BaDE717FF6E410B922F92adE80f"),
            protocol_fee_config: address!("0xb33D6502EdBbC47201cd1E53C49d703EC0a660b8"),
            refund_request: address!("0xc9BbA6A2CF9838e7Dd8c19BC8B3BAC620B9D8178"),
            token: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        },
    );
    m.insert(
        137,
        ContractSet {
            escrow: address!("0x32d6AC59BCe8DFB3026F10BcaDB8D00AB218f5b6"),
            operator_factory: address!("0xb33D6502EdBbC47201cd1E53C49d703EC0a660b8"),
            token_collector: address!("0xc1256Bb30bd0cdDa07D8C8Cf67a59105f2EA1b98"),
            protocol_fee_config: address!("0xE78648e7af7B1BaDE717FF6E410B922F92adE80f"),
            refund_request: address!("0xed02d3E5167BCc9582D851885A89b050AB816a56"),
            token: address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
        },
    );
    m.insert(
        42161,
        create2_set(address!("0xaf88d065e77c8cC2239327C5EDb3A432268e5831")),
    );
    m.insert(
        42220,
        create2_set(address!("0xcebA9300f2b948710d2653dD7B07f33A8B32118C")),
    );
    m.insert(
        143,
        create2_set(address!("0x754704Bc059F8C67012fEd69BC8A327a5aafb603")),
    );
    m.insert(
        43114,
        create2_set(address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E")),
    );
    m
});

/// Registry lookup failure. The message enumerates every supported chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No escrow contracts for chain {chain_id}. Supported chains: {supported}")]
pub struct UnsupportedChain {
    pub chain_id: u64,
    supported: String,
}

impl UnsupportedChain {
    pub fn new(chain_id: u64) -> Self {
        let supported = ESCROW_CONTRACTS
            .keys()
            .map(|id| format!("{} ({})", id, chain_name(*id)))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            chain_id,
            supported,
        }
    }
}

/// Look up the contract set of `chain_id`.
pub fn resolve(chain_id: u64) -> Result<&'static ContractSet, UnsupportedChain> {
    ESCROW_CONTRACTS
        .get(&chain_id)
        .ok_or_else(|| UnsupportedChain::new(chain_id))
}

pub fn is_supported(chain_id: u64) -> bool {
    ESCROW_CONTRACTS.contains_key(&chain_id)
}

/// Chain ids with escrow deployments, ascending.
pub fn supported_chains() -> Vec<u64> {
    ESCROW_CONTRACTS.keys().copied().collect()
}

pub fn chain_name(chain_id: u64) -> &'static str {
    Network::from_chain_id(chain_id)
        .map(|n| n.display_name())
        .unwrap_or("unknown")
}

/// EIP-712 domain of the settlement token, owned so that custom deployments
/// can carry a domain name outside the static network table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDomain {
    pub name: String,
    pub version: String,
}

impl From<TokenEip712> for TokenDomain {
    fn from(value: TokenEip712) -> Self {
        TokenDomain {
            name: value.name.to_string(),
            version: value.version.to_string(),
        }
    }
}

impl Default for TokenDomain {
    fn default() -> Self {
        TokenDomain {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
        }
    }
}

/// The contract addresses a client instance operates on.
///
/// Either resolved from the registry plus an operator instance, or supplied
/// verbatim for a custom deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowContracts {
    pub operator: Address,
    pub escrow: Address,
    pub token_collector: Address,
    pub token: Address,
    pub token_domain: TokenDomain,
    pub operator_factory: Option<Address>,
    pub protocol_fee_config: Option<Address>,
    pub refund_request: Option<Address>,
}

impl EscrowContracts {
    /// A custom deployment that bypasses the registry.
    pub fn custom(
        operator: Address,
        escrow: Address,
        token_collector: Address,
        token: Address,
        token_domain: TokenDomain,
    ) -> Self {
        Self {
            operator,
            escrow,
            token_collector,
            token,
            token_domain,
            operator_factory: None,
            protocol_fee_config: None,
            refund_request: None,
        }
    }

    /// Resolve from the registry, binding the given operator instance.
    ///
    /// On Base mainnet a missing operator falls back to [`LEGACY_BASE_OPERATOR`];
    /// on every other chain it is an error naming the factory to deploy from.
    pub fn from_registry(
        chain_id: u64,
        operator: Option<Address>,
    ) -> Result<Self, ContractResolutionError> {
        let set = resolve(chain_id)?;
        let operator = match operator {
            Some(operator) => operator,
            None if chain_id == BASE_MAINNET_CHAIN_ID => LEGACY_BASE_OPERATOR,
            None => {
                return Err(ContractResolutionError::MissingOperator {
                    chain_id,
                    chain_name: chain_name(chain_id),
                    factory: set.operator_factory,
                })
            }
        };
        let token_domain = Network::from_chain_id(chain_id)
            .map(|n| TokenDomain::from(n.usdc().eip712))
            .unwrap_or_default();
        Ok(Self {
            operator,
            escrow: set.escrow,
            token_collector: set.token_collector,
            token: set.token,
            token_domain,
            operator_factory: Some(set.operator_factory),
            protocol_fee_config: Some(set.protocol_fee_config),
            refund_request: Some(set.refund_request),
        })
    }
}

/// Errors raised while binding registry contracts to an operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractResolutionError {
    #[error(transparent)]
    UnsupportedChain(#[from] UnsupportedChain),
    #[error("operator address is required for chain {chain_name} (chain_id={chain_id}). Deploy a PaymentOperator via the factory at {factory} and pass its address")]
    MissingOperator {
        chain_id: u64,
        chain_name: &'static str,
        factory: Address,
    },
}
