//! ERC-3009 `ReceiveWithAuthorization` signing.
//!
//! The signature is produced over the EIP-712 hash of the authorization,
//! bound to the token's own domain. Circle's USDC deployments disagree on the
//! domain name ("USD Coin" vs "USDC"), so the domain is always taken from the
//! resolved contract set rather than assumed.

use alloy::primitives::{Address, Bytes, FixedBytes, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::abi::ReceiveWithAuthorization;
use crate::registry::TokenDomain;
use crate::timestamp::UnixTimestamp;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("failed to sign authorization: {0}")]
    Signer(#[from] alloy::signers::Error),
}

/// Abstracts signing so both owned and `Arc`-shared signers can be used.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy::signers::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy::signers::Error> {
        alloy::signers::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        self.as_ref().address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy::signers::Error> {
        self.as_ref().sign_hash(hash).await
    }
}

/// A transfer authorization as sent to the facilitator and signed by the payer.
///
/// `nonce` is kept as raw 32 bytes: the EIP-712 encoding of `bytes32` differs
/// from that of a number or a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

impl TransferAuthorization {
    fn to_eip712(self) -> ReceiveWithAuthorization {
        ReceiveWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }

    /// EIP-712 signing hash under the token domain.
    pub fn signing_hash(&self, domain: &TokenDomain, chain_id: u64, token: Address) -> B256 {
        let domain = eip712_domain! {
            name: domain.name.clone(),
            version: domain.version.clone(),
            chain_id: chain_id,
            verifying_contract: token,
        };
        self.to_eip712().eip712_signing_hash(&domain)
    }
}

/// Signs `authorization` for the token at `token` on `chain_id`.
///
/// Returns the 65-byte `r || s || v` signature.
#[instrument(skip_all, err, fields(from = %authorization.from, to = %authorization.to, chain_id = chain_id))]
pub async fn sign_receive_with_authorization<S: SignerLike + Sync>(
    signer: &S,
    domain: &TokenDomain,
    chain_id: u64,
    token: Address,
    authorization: &TransferAuthorization,
) -> Result<Bytes, SigningError> {
    let hash = authorization.signing_hash(domain, chain_id, token);
    let signature = signer.sign_hash(&hash).await?;
    Ok(Bytes::from(signature.as_bytes()))
}
