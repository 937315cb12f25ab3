//! Client configuration from environment variables.
//!
//! Variables (a `.env` file is loaded first by the binary):
//! - `EVM_PRIVATE_KEY`: hex private key of the payer
//! - `FACILITATOR_URL`: defaults to the public Ultravioleta facilitator
//! - `ESCROW_CHAIN_ID`: defaults to Base mainnet (8453)
//! - `RPC_URL_<NETWORK>`, then `RPC_URL`: direct-operation endpoint; the
//!   network's public RPC otherwise
//! - `ESCROW_OPERATOR_ADDRESS`: `PaymentOperator` instance
//! - `ESCROW_GAS_LIMIT`, `TX_RECEIPT_TIMEOUT_SECS`
//! - `ENABLE_POST_ESCROW_REFUND`: submit `refundPostEscrow` anyway

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::config::{EscrowClientConfig, EscrowConfigError};
use crate::network::Network;

pub const ENV_EVM_PRIVATE_KEY: &str = "EVM_PRIVATE_KEY";
pub const ENV_FACILITATOR_URL: &str = "FACILITATOR_URL";
pub const ENV_ESCROW_CHAIN_ID: &str = "ESCROW_CHAIN_ID";
pub const ENV_ESCROW_OPERATOR_ADDRESS: &str = "ESCROW_OPERATOR_ADDRESS";
pub const ENV_ESCROW_GAS_LIMIT: &str = "ESCROW_GAS_LIMIT";
pub const ENV_TX_RECEIPT_TIMEOUT_SECS: &str = "TX_RECEIPT_TIMEOUT_SECS";
pub const ENV_ENABLE_POST_ESCROW_REFUND: &str = "ENABLE_POST_ESCROW_REFUND";

pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_RPC_ETHEREUM: &str = "RPC_URL_ETHEREUM";
pub const ENV_RPC_ETHEREUM_SEPOLIA: &str = "RPC_URL_ETHEREUM_SEPOLIA";
pub const ENV_RPC_BASE: &str = "RPC_URL_BASE";
pub const ENV_RPC_BASE_SEPOLIA: &str = "RPC_URL_BASE_SEPOLIA";
pub const ENV_RPC_POLYGON: &str = "RPC_URL_POLYGON";
pub const ENV_RPC_ARBITRUM: &str = "RPC_URL_ARBITRUM";
pub const ENV_RPC_OPTIMISM: &str = "RPC_URL_OPTIMISM";
pub const ENV_RPC_AVALANCHE: &str = "RPC_URL_AVALANCHE";
pub const ENV_RPC_CELO: &str = "RPC_URL_CELO";
pub const ENV_RPC_HYPEREVM: &str = "RPC_URL_HYPEREVM";
pub const ENV_RPC_UNICHAIN: &str = "RPC_URL_UNICHAIN";
pub const ENV_RPC_MONAD: &str = "RPC_URL_MONAD";
pub const ENV_RPC_BSC: &str = "RPC_URL_BSC";

pub fn rpc_env_name_from_network(network: Network) -> &'static str {
    match network {
        Network::Ethereum => ENV_RPC_ETHEREUM,
        Network::EthereumSepolia => ENV_RPC_ETHEREUM_SEPOLIA,
        Network::Base => ENV_RPC_BASE,
        Network::BaseSepolia => ENV_RPC_BASE_SEPOLIA,
        Network::Polygon => ENV_RPC_POLYGON,
        Network::Arbitrum => ENV_RPC_ARBITRUM,
        Network::Optimism => ENV_RPC_OPTIMISM,
        Network::Avalanche => ENV_RPC_AVALANCHE,
        Network::Celo => ENV_RPC_CELO,
        Network::HyperEvm => ENV_RPC_HYPEREVM,
        Network::Unichain => ENV_RPC_UNICHAIN,
        Network::Monad => ENV_RPC_MONAD,
        Network::Bsc => ENV_RPC_BSC,
    }
}

/// Builds an [`EscrowClientConfig`] from the process environment.
pub fn config_from_env() -> Result<EscrowClientConfig, EscrowConfigError> {
    config_from_lookup(|name| env::var(name).ok())
}

/// Reads the payer key from `EVM_PRIVATE_KEY`.
pub fn signer_from_env() -> Result<PrivateKeySigner, EscrowConfigError> {
    let raw = env::var(ENV_EVM_PRIVATE_KEY).map_err(|_| EscrowConfigError::Env {
        var: ENV_EVM_PRIVATE_KEY,
        reason: "not set".to_string(),
    })?;
    parse_private_key(&raw)
}

pub fn parse_private_key(raw: &str) -> Result<PrivateKeySigner, EscrowConfigError> {
    PrivateKeySigner::from_str(raw.trim())
        .map_err(|e| EscrowConfigError::InvalidPrivateKey(e.to_string()))
}

/// Same as [`config_from_env`], reading variables through `lookup`. Empty
/// values count as unset.
pub fn config_from_lookup<F>(lookup: F) -> Result<EscrowClientConfig, EscrowConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let mut config = match get(ENV_ESCROW_CHAIN_ID) {
        Some(raw) => EscrowClientConfig::new(parse_var(ENV_ESCROW_CHAIN_ID, &raw)?),
        None => EscrowClientConfig::default(),
    };

    if let Some(url) = get(ENV_FACILITATOR_URL) {
        config = config.with_facilitator_url(url.trim());
    }

    let rpc_url = Network::from_chain_id(config.chain_id)
        .and_then(|network| get(rpc_env_name_from_network(network)))
        .or_else(|| get(ENV_RPC_URL));
    if let Some(raw) = rpc_url {
        let url = Url::parse(raw.trim()).map_err(|source| EscrowConfigError::InvalidRpcUrl {
            url: raw.clone(),
            source,
        })?;
        config = config.with_rpc_url(url);
    }

    if let Some(raw) = get(ENV_ESCROW_OPERATOR_ADDRESS) {
        let operator: Address = parse_var(ENV_ESCROW_OPERATOR_ADDRESS, &raw)?;
        config = config.with_operator(operator);
    }

    if let Some(raw) = get(ENV_ESCROW_GAS_LIMIT) {
        config = config.with_gas_limit(parse_var(ENV_ESCROW_GAS_LIMIT, &raw)?);
    }

    if let Some(raw) = get(ENV_TX_RECEIPT_TIMEOUT_SECS) {
        let secs: u64 = parse_var(ENV_TX_RECEIPT_TIMEOUT_SECS, &raw)?;
        config = config.with_receipt_timeout(Duration::from_secs(secs));
    }

    if let Some(raw) = get(ENV_ENABLE_POST_ESCROW_REFUND) {
        config = config.with_post_escrow_refund(parse_flag(ENV_ENABLE_POST_ESCROW_REFUND, &raw)?);
    }

    Ok(config)
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, EscrowConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| EscrowConfigError::Env {
        var,
        reason: format!("{raw:?}: {e}"),
    })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, EscrowConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EscrowConfigError::Env {
            var,
            reason: format!("{raw:?} is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.facilitator_url, "https://facilitator.ultravioletadao.xyz");
        assert!(config.rpc_url.is_none());
        assert!(config.operator.is_none());
        assert!(!config.allow_post_escrow_refund);
    }

    #[test]
    fn test_network_rpc_takes_precedence_over_generic() {
        let config = config_from_lookup(lookup(&[
            (ENV_ESCROW_CHAIN_ID, "84532"),
            (ENV_RPC_BASE_SEPOLIA, "https://sepolia.example.org"),
            (ENV_RPC_URL, "https://generic.example.org"),
        ]))
        .unwrap();
        assert_eq!(
            config.rpc_url.unwrap().as_str(),
            "https://sepolia.example.org/"
        );

        let config = config_from_lookup(lookup(&[
            (ENV_ESCROW_CHAIN_ID, "84532"),
            (ENV_RPC_BASE, "https://mainnet.example.org"),
            (ENV_RPC_URL, "https://generic.example.org"),
        ]))
        .unwrap();
        assert_eq!(
            config.rpc_url.unwrap().as_str(),
            "https://generic.example.org/"
        );
    }

    #[test]
    fn test_full_environment() {
        let config = config_from_lookup(lookup(&[
            (ENV_ESCROW_CHAIN_ID, "137"),
            (ENV_FACILITATOR_URL, "http://localhost:8080"),
            (
                ENV_ESCROW_OPERATOR_ADDRESS,
                "0x1111111111111111111111111111111111111111",
            ),
            (ENV_ESCROW_GAS_LIMIT, "500000"),
            (ENV_TX_RECEIPT_TIMEOUT_SECS, "30"),
            (ENV_ENABLE_POST_ESCROW_REFUND, "true"),
        ]))
        .unwrap();
        assert_eq!(config.chain_id, 137);
        assert_eq!(config.facilitator_url, "http://localhost:8080");
        assert_eq!(
            config.operator,
            Some(address!("0x1111111111111111111111111111111111111111"))
        );
        assert_eq!(config.gas_limit, 500_000);
        assert_eq!(config.receipt_timeout, Duration::from_secs(30));
        assert!(config.allow_post_escrow_refund);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config_from_lookup(lookup(&[(ENV_ESCROW_CHAIN_ID, "base")])).unwrap_err();
        assert!(err.to_string().contains(ENV_ESCROW_CHAIN_ID));

        let err =
            config_from_lookup(lookup(&[(ENV_ENABLE_POST_ESCROW_REFUND, "maybe")])).unwrap_err();
        assert!(err.to_string().contains(ENV_ENABLE_POST_ESCROW_REFUND));

        let err = config_from_lookup(lookup(&[(ENV_RPC_URL, "not a url")])).unwrap_err();
        assert!(matches!(err, EscrowConfigError::InvalidRpcUrl { .. }));
    }

    #[test]
    fn test_every_network_has_an_rpc_variable() {
        for network in Network::variants() {
            assert!(rpc_env_name_from_network(*network).starts_with("RPC_URL_"));
        }
    }

    #[test]
    fn test_parse_private_key() {
        let signer = parse_private_key(
            " 0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80 ",
        )
        .unwrap();
        assert_eq!(
            signer.address(),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert!(matches!(
            parse_private_key("0x1234"),
            Err(EscrowConfigError::InvalidPrivateKey(_))
        ));
    }
}
