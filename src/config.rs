//! Client configuration and construction errors.

use alloy::primitives::Address;
use std::time::Duration;
use url::Url;

use crate::dispatcher::{DEFAULT_GAS_LIMIT, DEFAULT_RECEIPT_TIMEOUT};
use crate::facilitator_client::{FacilitatorClient, FacilitatorClientError};
use crate::network::Network;
use crate::registry::{ContractResolutionError, EscrowContracts};

/// Public facilitator operated by Ultravioleta DAO.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.ultravioletadao.xyz";

/// Errors raised while building a client. None of them is retryable without
/// changing the configuration.
#[derive(Debug, thiserror::Error)]
pub enum EscrowConfigError {
    #[error(transparent)]
    Contracts(#[from] ContractResolutionError),
    #[error("Invalid facilitator URL: {0}")]
    Facilitator(#[from] FacilitatorClientError),
    #[error("Invalid RPC URL {url:?}: {source}")]
    InvalidRpcUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("No RPC URL configured for chain {0}")]
    MissingRpcUrl(u64),
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Environment variable {var}: {reason}")]
    Env { var: &'static str, reason: String },
}

/// Everything an [`AdvancedEscrowClient`](crate::escrow::AdvancedEscrowClient) needs
/// besides the signing key.
#[derive(Debug, Clone)]
pub struct EscrowClientConfig {
    pub chain_id: u64,
    pub facilitator_url: String,
    /// Falls back to the public RPC of the network when unset.
    pub rpc_url: Option<Url>,
    /// `PaymentOperator` instance; required outside Base mainnet.
    pub operator: Option<Address>,
    /// Custom deployment, bypassing the registry.
    pub contracts: Option<EscrowContracts>,
    pub gas_limit: u64,
    pub receipt_timeout: Duration,
    pub settle_timeout: Duration,
    pub state_timeout: Duration,
    /// Submit `refundPostEscrow` instead of refusing it locally.
    pub allow_post_escrow_refund: bool,
}

impl Default for EscrowClientConfig {
    fn default() -> Self {
        Self {
            chain_id: crate::registry::BASE_MAINNET_CHAIN_ID,
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            rpc_url: None,
            operator: None,
            contracts: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            settle_timeout: FacilitatorClient::DEFAULT_SETTLE_TIMEOUT,
            state_timeout: FacilitatorClient::DEFAULT_STATE_TIMEOUT,
            allow_post_escrow_refund: false,
        }
    }
}

impl EscrowClientConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    pub fn with_facilitator_url(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = url.into();
        self
    }

    pub fn with_rpc_url(mut self, url: Url) -> Self {
        self.rpc_url = Some(url);
        self
    }

    pub fn with_operator(mut self, operator: Address) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_contracts(mut self, contracts: EscrowContracts) -> Self {
        self.contracts = Some(contracts);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_post_escrow_refund(mut self, allow: bool) -> Self {
        self.allow_post_escrow_refund = allow;
        self
    }

    /// Explicit contracts win; otherwise the registry entry for `chain_id`
    /// bound to the configured operator.
    pub fn resolve_contracts(&self) -> Result<EscrowContracts, EscrowConfigError> {
        match &self.contracts {
            Some(contracts) => Ok(contracts.clone()),
            None => Ok(EscrowContracts::from_registry(self.chain_id, self.operator)?),
        }
    }

    /// Configured RPC endpoint, or the network's public one.
    pub fn resolve_rpc_url(&self) -> Result<Url, EscrowConfigError> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        let network =
            Network::from_chain_id(self.chain_id).ok_or(EscrowConfigError::MissingRpcUrl(self.chain_id))?;
        let url = network.default_rpc_url();
        Url::parse(url).map_err(|source| EscrowConfigError::InvalidRpcUrl {
            url: url.to_string(),
            source,
        })
    }

    pub fn facilitator(&self) -> Result<FacilitatorClient, EscrowConfigError> {
        let client = FacilitatorClient::try_from(self.facilitator_url.as_str())?
            .with_timeouts(self.settle_timeout, self.state_timeout);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TokenDomain;
    use alloy::primitives::address;

    #[test]
    fn test_defaults() {
        let config = EscrowClientConfig::default();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.gas_limit, 300_000);
        assert_eq!(config.receipt_timeout, Duration::from_secs(120));
        assert!(!config.allow_post_escrow_refund);
        assert_eq!(
            config.resolve_rpc_url().unwrap().as_str(),
            "https://mainnet.base.org/"
        );
    }

    #[test]
    fn test_unknown_chain_fails_without_explicit_contracts() {
        let config = EscrowClientConfig::new(31337);
        let err = config.resolve_contracts().unwrap_err();
        assert!(err.to_string().starts_with("No escrow contracts for chain 31337"));
        assert!(matches!(
            config.resolve_rpc_url(),
            Err(EscrowConfigError::MissingRpcUrl(31337))
        ));

        let custom = EscrowContracts::custom(
            address!("0x1111111111111111111111111111111111111111"),
            address!("0x2222222222222222222222222222222222222222"),
            address!("0x3333333333333333333333333333333333333333"),
            address!("0x4444444444444444444444444444444444444444"),
            TokenDomain::default(),
        );
        let config = EscrowClientConfig::new(31337).with_contracts(custom.clone());
        assert_eq!(config.resolve_contracts().unwrap(), custom);
    }

    #[test]
    fn test_explicit_contracts_take_precedence() {
        let custom = EscrowContracts::custom(
            address!("0x1111111111111111111111111111111111111111"),
            address!("0x2222222222222222222222222222222222222222"),
            address!("0x3333333333333333333333333333333333333333"),
            address!("0x4444444444444444444444444444444444444444"),
            TokenDomain::default(),
        );
        let config = EscrowClientConfig::new(8453).with_contracts(custom.clone());
        assert_eq!(config.resolve_contracts().unwrap(), custom);
    }
}
