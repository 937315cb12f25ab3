//! Direct on-chain submission of operator calls.
//!
//! A [`TransactionDispatcher`] takes target and calldata, signs with the
//! client key, submits, and waits for the receipt within a bounded time.
//! It never retries and does not serialize concurrent submissions from the
//! same key: overlapping calls race for the account nonce.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, PendingTransactionError, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default gas limit for operator calls.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
/// Default upper bound on the wait for a receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A contract call to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
    /// Target contract address.
    pub to: Address,
    /// Encoded function call.
    pub calldata: Bytes,
    pub gas_limit: u64,
}

/// A mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub transaction_hash: B256,
    pub gas_used: u64,
    /// Receipt status: `false` means the call reverted.
    pub status: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
}

pub trait TransactionDispatcher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Submits `tx` and waits for its receipt.
    fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<TransactionOutcome, Self::Error>> + Send;
}

/// Dispatcher over a JSON-RPC endpoint, signing locally.
#[derive(Clone)]
pub struct RpcDispatcher {
    provider: DynProvider,
    sender: Address,
    receipt_timeout: Duration,
}

impl RpcDispatcher {
    pub fn new(signer: PrivateKeySigner, rpc_url: Url, receipt_timeout: Duration) -> Self {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        Self {
            provider,
            sender,
            receipt_timeout,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }
}

impl TransactionDispatcher for RpcDispatcher {
    type Error = DispatchError;

    /// Prices the transaction at twice the current gas price with the gas
    /// price as tip; the account nonce is filled by the provider.
    #[instrument(skip_all, err, fields(to = %tx.to, from = %self.sender))]
    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<TransactionOutcome, DispatchError> {
        let gas_price = self.provider.get_gas_price().await?;
        let request = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(tx.to)
            .with_input(tx.calldata)
            .with_gas_limit(tx.gas_limit)
            .with_max_fee_per_gas(gas_price.saturating_mul(2))
            .with_max_priority_fee_per_gas(gas_price);

        let pending = self.provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "Transaction submitted, waiting for receipt");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await?;
        Ok(TransactionOutcome {
            transaction_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
            status: receipt.status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_rpc_is_a_transport_error() {
        let signer = PrivateKeySigner::random();
        let expected_sender = signer.address();
        let rpc_url: Url = "http://127.0.0.1:1".parse().unwrap();
        let dispatcher = RpcDispatcher::new(signer, rpc_url, Duration::from_secs(1));
        assert_eq!(dispatcher.sender(), expected_sender);

        let result = dispatcher
            .send_transaction(MetaTransaction {
                to: Address::ZERO,
                calldata: Bytes::new(),
                gas_limit: DEFAULT_GAS_LIMIT,
            })
            .await;
        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }
}
