//! CAIP-2 network identifiers for EIP-155 chains.
//!
//! Format: `eip155:{chain_id}`, e.g. `eip155:8453` for Base mainnet.
//!
//! Reference: <https://github.com/ChainAgnostic/CAIPs/blob/main/CAIPs/caip-2.md>

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The only namespace the escrow scheme runs on.
pub const EIP155_NAMESPACE: &str = "eip155";

/// CAIP-2 identifier of an EVM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caip2NetworkId {
    chain_id: u64,
}

impl Caip2NetworkId {
    /// Create a CAIP-2 ID for an EIP-155 chain by chain ID.
    pub fn eip155(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Parse a CAIP-2 string.
    pub fn parse(s: &str) -> Result<Self, Caip2ParseError> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| Caip2ParseError::InvalidFormat(s.to_string()))?;
        if namespace != EIP155_NAMESPACE {
            return Err(Caip2ParseError::UnknownNamespace(namespace.to_string()));
        }
        let chain_id = reference
            .parse::<u64>()
            .map_err(|_| Caip2ParseError::InvalidChainId(reference.to_string()))?;
        Ok(Self { chain_id })
    }
}

impl Display for Caip2NetworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", EIP155_NAMESPACE, self.chain_id)
    }
}

impl FromStr for Caip2NetworkId {
    type Err = Caip2ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Caip2NetworkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Caip2NetworkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Caip2ParseError {
    #[error("Invalid CAIP-2 format (expected namespace:reference): {0}")]
    InvalidFormat(String),

    #[error("Unsupported CAIP-2 namespace: {0}")]
    UnknownNamespace(String),

    #[error("Invalid EIP-155 chain id: {0}")]
    InvalidChainId(String),
}
