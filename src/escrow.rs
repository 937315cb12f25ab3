//! x402 Advanced Escrow client.
//!
//! Drives a payment through the commerce-payments `PaymentOperator`:
//!
//! - `authorize`: the payer signs an ERC-3009 `ReceiveWithAuthorization` to
//!   the token collector and the facilitator submits it, locking funds in escrow
//! - `release`: capture escrowed funds to the receiver
//! - `refund_in_escrow`: return escrowed funds to the payer
//! - `charge`: collect and pay the receiver in one step, without escrow hold
//! - `refund_post_escrow`: refund after release; not functional on chain
//!
//! The direct operations are submitted by this client and cost gas. The
//! `*_via_facilitator` variants ask the facilitator (1.32.0 or newer) to submit
//! the same call and pay for it. `query_escrow_state` reads balances through
//! the facilitator.
//!
//! # Failure reporting
//!
//! Every operation except `query_escrow_state` reports failure as data in its
//! result; nothing is retried and nothing is deduplicated. Submitting the same
//! payment twice issues two calls.
//!
//! # Deposit limit
//!
//! Operators reject authorizations above
//! [`DEPOSIT_LIMIT_USDC`](crate::payment_info::DEPOSIT_LIMIT_USDC). The client
//! does not pre-check it.

use alloy::primitives::aliases::U120;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use tracing::{debug, info, instrument, warn};

use crate::abi::IPaymentOperator;
use crate::caip2::Caip2NetworkId;
use crate::config::{EscrowClientConfig, EscrowConfigError};
use crate::dispatcher::{MetaTransaction, RpcDispatcher, TransactionDispatcher};
use crate::facilitator_client::FacilitatorClient;
use crate::lifecycle::EscrowAction;
use crate::nonce;
use crate::payment_info::{PaymentInfo, PaymentInfoError, Salt, TaskTier};
use crate::registry::EscrowContracts;
use crate::signer::{
    sign_receive_with_authorization, SignerLike, SigningError, TransferAuthorization,
};
use crate::timestamp::UnixTimestamp;
use crate::types::{
    ActionPayload, ActionRequirements, ActionSettleRequest, AuthorizationResult,
    AuthorizationWire, AuthorizePayload, AuthorizeRequirements, AuthorizeSettleRequest,
    EscrowExtra, EscrowStateError, EscrowStateRequest, EscrowStateSnapshot, Scheme,
    SettleAction, SettleResponse, TokenAmount, TransactionResult, X402_VERSION,
};

/// Returned instead of submitting `refundPostEscrow` unless explicitly enabled.
pub const POST_ESCROW_REFUND_DISABLED: &str = "refundPostEscrow is not functional: the protocol has not deployed the refund token collector. Refund with refund_in_escrow before releasing instead";

/// A payment to `receiver` on `contracts`, with expiries from `tier` counted
/// from now. Needs no key or RPC endpoint.
pub fn payment_info_for(
    contracts: &EscrowContracts,
    receiver: Address,
    amount: u128,
    tier: TaskTier,
    salt: Option<Salt>,
    min_fee_bps: u16,
    max_fee_bps: u16,
) -> Result<PaymentInfo, PaymentInfoError> {
    let mut builder = PaymentInfo::builder(contracts.operator, receiver, contracts.token, amount)
        .tier(tier, UnixTimestamp::now())
        .fee_bps(min_fee_bps, max_fee_bps)
        .fee_receiver(contracts.operator);
    if let Some(salt) = salt {
        builder = builder.salt(salt);
    }
    builder.build()
}

/// The amount an operation acts on: the explicit one, or the full `max_amount`.
///
/// `Some(0)` is honoured as zero.
pub fn resolve_amount(info: &PaymentInfo, amount: Option<u128>) -> u128 {
    amount.unwrap_or(info.max_amount())
}

pub struct AdvancedEscrowClient<S, D> {
    signer: S,
    dispatcher: D,
    facilitator: FacilitatorClient,
    chain_id: u64,
    contracts: EscrowContracts,
    gas_limit: u64,
    allow_post_escrow_refund: bool,
}

impl AdvancedEscrowClient<PrivateKeySigner, RpcDispatcher> {
    /// Client that submits direct operations through the configured RPC endpoint.
    pub fn connect(
        signer: PrivateKeySigner,
        config: &EscrowClientConfig,
    ) -> Result<Self, EscrowConfigError> {
        let rpc_url = config.resolve_rpc_url()?;
        let dispatcher = RpcDispatcher::new(signer.clone(), rpc_url, config.receipt_timeout);
        Self::new(signer, dispatcher, config)
    }
}

impl<S, D> AdvancedEscrowClient<S, D>
where
    S: SignerLike + Sync,
    D: TransactionDispatcher + Sync,
{
    /// Resolves contracts and the facilitator endpoint. Fails on an unsupported
    /// chain or a missing operator, never later.
    pub fn new(
        signer: S,
        dispatcher: D,
        config: &EscrowClientConfig,
    ) -> Result<Self, EscrowConfigError> {
        let contracts = config.resolve_contracts()?;
        let facilitator = config.facilitator()?;
        info!(
            chain_id = config.chain_id,
            payer = %signer.address(),
            operator = %contracts.operator,
            escrow = %contracts.escrow,
            facilitator = %facilitator.base_url(),
            "Escrow client ready"
        );
        Ok(Self {
            signer,
            dispatcher,
            facilitator,
            chain_id: config.chain_id,
            contracts,
            gas_limit: config.gas_limit,
            allow_post_escrow_refund: config.allow_post_escrow_refund,
        })
    }

    /// Address of the signing account.
    pub fn payer(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn network(&self) -> Caip2NetworkId {
        Caip2NetworkId::eip155(self.chain_id)
    }

    pub fn contracts(&self) -> &EscrowContracts {
        &self.contracts
    }

    /// A payment to `receiver` on this client's operator and token, with
    /// expiries from `tier` counted from now.
    pub fn build_payment_info(
        &self,
        receiver: Address,
        amount: u128,
        tier: TaskTier,
        salt: Option<Salt>,
        min_fee_bps: u16,
        max_fee_bps: u16,
    ) -> Result<PaymentInfo, PaymentInfoError> {
        payment_info_for(
            &self.contracts,
            receiver,
            amount,
            tier,
            salt,
            min_fee_bps,
            max_fee_bps,
        )
    }

    /// The nonce the escrow will derive for `info`.
    pub fn compute_nonce(&self, info: &PaymentInfo) -> B256 {
        nonce::compute_nonce(info, self.chain_id, self.contracts.escrow)
    }

    fn extra(&self) -> EscrowExtra {
        EscrowExtra {
            escrow_address: self.contracts.escrow,
            operator_address: self.contracts.operator,
            token_collector: self.contracts.token_collector,
        }
    }

    /// Authorization of `value` to the token collector, valid until the
    /// pre-approval expiry.
    async fn sign_collector_authorization(
        &self,
        info: &PaymentInfo,
        value: u128,
    ) -> Result<(TransferAuthorization, Bytes), SigningError> {
        let authorization = TransferAuthorization {
            from: self.payer(),
            to: self.contracts.token_collector,
            value: U256::from(value),
            valid_after: UnixTimestamp::from_secs(0),
            valid_before: info.pre_approval_expiry(),
            nonce: self.compute_nonce(info),
        };
        let signature = sign_receive_with_authorization(
            &self.signer,
            &self.contracts.token_domain,
            self.chain_id,
            self.contracts.token,
            &authorization,
        )
        .await?;
        Ok((authorization, signature))
    }

    // ========================================================================
    // Facilitator operations
    // ========================================================================

    /// Locks `info.max_amount` in escrow through the facilitator.
    #[instrument(skip_all, fields(chain_id = self.chain_id, receiver = %info.receiver(), amount = info.max_amount()))]
    pub async fn authorize(&self, info: &PaymentInfo) -> AuthorizationResult {
        let (authorization, signature) =
            match self.sign_collector_authorization(info, info.max_amount()).await {
                Ok(signed) => signed,
                Err(e) => return AuthorizationResult::failed(e.to_string()),
            };
        debug!(nonce = %authorization.nonce, "Signed escrow authorization");

        let request = AuthorizeSettleRequest {
            x402_version: X402_VERSION,
            scheme: Scheme::Escrow,
            payload: AuthorizePayload {
                authorization: AuthorizationWire::new(&authorization),
                signature,
                payment_info: info.clone(),
            },
            payment_requirements: AuthorizeRequirements {
                scheme: Scheme::Escrow,
                network: self.network(),
                max_amount_required: TokenAmount(info.max_amount()),
                asset: self.contracts.token,
                pay_to: info.receiver(),
                extra: self.extra(),
            },
        };

        match self.facilitator.settle_authorization(&request).await {
            Ok(SettleResponse {
                success: true,
                transaction: Some(transaction),
                ..
            }) => {
                info!(tx_hash = %transaction, "Escrow authorized");
                AuthorizationResult::authorized(transaction, info.clone())
            }
            Ok(response) => {
                let reason = settle_failure_reason(&response);
                warn!(reason = %reason, "Facilitator rejected escrow authorization");
                AuthorizationResult::failed(reason)
            }
            Err(e) => {
                warn!(error = %e, "Escrow authorization request failed");
                AuthorizationResult::failed(e.to_string())
            }
        }
    }

    /// Gasless `release`, submitted and paid for by the facilitator.
    pub async fn release_via_facilitator(
        &self,
        info: &PaymentInfo,
        amount: Option<u128>,
    ) -> TransactionResult {
        self.settle_action(SettleAction::Release, info, amount).await
    }

    /// Gasless `refundInEscrow`, submitted and paid for by the facilitator.
    pub async fn refund_via_facilitator(
        &self,
        info: &PaymentInfo,
        amount: Option<u128>,
    ) -> TransactionResult {
        self.settle_action(SettleAction::RefundInEscrow, info, amount)
            .await
    }

    #[instrument(skip_all, fields(chain_id = self.chain_id, %action, amount))]
    async fn settle_action(
        &self,
        action: SettleAction,
        info: &PaymentInfo,
        amount: Option<u128>,
    ) -> TransactionResult {
        let amount = resolve_amount(info, amount);
        tracing::Span::current().record("amount", amount);

        let request = ActionSettleRequest {
            x402_version: X402_VERSION,
            scheme: Scheme::Escrow,
            action,
            payload: ActionPayload {
                payment_info: info.clone(),
                payer: self.payer(),
                amount: TokenAmount(amount),
            },
            payment_requirements: ActionRequirements {
                scheme: Scheme::Escrow,
                network: self.network(),
                extra: self.extra(),
            },
        };

        match self.facilitator.settle_action(&request).await {
            Ok(SettleResponse {
                success: true,
                transaction: Some(transaction),
                ..
            }) => {
                info!(tx_hash = %transaction, "Facilitator settled escrow action");
                TransactionResult::settled(transaction)
            }
            Ok(response) => {
                let reason = settle_failure_reason(&response);
                warn!(reason = %reason, "Facilitator rejected escrow action");
                TransactionResult::failed(reason)
            }
            Err(e) => {
                warn!(error = %e, "Escrow action request failed");
                TransactionResult::failed(e.to_string())
            }
        }
    }

    /// Current escrow balances of `info` for this payer.
    #[instrument(skip_all, err, fields(chain_id = self.chain_id))]
    pub async fn query_escrow_state(
        &self,
        info: &PaymentInfo,
    ) -> Result<EscrowStateSnapshot, EscrowStateError> {
        let request = EscrowStateRequest {
            payment_info: info.clone(),
            payer: self.payer(),
            network: self.network(),
            extra: self.extra(),
        };
        let response = self.facilitator.escrow_state(&request).await?;
        let snapshot = EscrowStateSnapshot::try_from(response)?;
        debug!(
            capturable = %snapshot.capturable_amount,
            refundable = %snapshot.refundable_amount,
            collected = snapshot.has_collected_payment,
            "Escrow state"
        );
        Ok(snapshot)
    }

    // ========================================================================
    // Direct operations
    // ========================================================================

    /// Captures `amount` (default `max_amount`) to the receiver.
    #[instrument(skip_all, fields(chain_id = self.chain_id, amount))]
    pub async fn release(&self, info: &PaymentInfo, amount: Option<u128>) -> TransactionResult {
        let amount = resolve_amount(info, amount);
        tracing::Span::current().record("amount", amount);
        let call = IPaymentOperator::releaseCall {
            paymentInfo: info.to_onchain(self.payer()),
            amount: U256::from(amount),
        };
        self.dispatch(EscrowAction::Release, call.abi_encode().into())
            .await
    }

    /// Returns `amount` (default `max_amount`) of escrowed funds to the payer.
    #[instrument(skip_all, fields(chain_id = self.chain_id, amount))]
    pub async fn refund_in_escrow(
        &self,
        info: &PaymentInfo,
        amount: Option<u128>,
    ) -> TransactionResult {
        let amount = resolve_amount(info, amount);
        tracing::Span::current().record("amount", amount);
        let Ok(amount) = U120::try_from(amount) else {
            return TransactionResult::failed(format!(
                "refund amount {amount} does not fit in uint120"
            ));
        };
        let call = IPaymentOperator::refundInEscrowCall {
            paymentInfo: info.to_onchain(self.payer()),
            amount,
        };
        self.dispatch(EscrowAction::RefundInEscrow, call.abi_encode().into())
            .await
    }

    /// Pays `amount` (default `max_amount`) straight to the receiver.
    ///
    /// Signs a fresh collector authorization for `amount` and passes it to the
    /// operator as collector data.
    #[instrument(skip_all, fields(chain_id = self.chain_id, amount))]
    pub async fn charge(&self, info: &PaymentInfo, amount: Option<u128>) -> TransactionResult {
        let amount = resolve_amount(info, amount);
        tracing::Span::current().record("amount", amount);
        let signature = match self.sign_collector_authorization(info, amount).await {
            Ok((_, signature)) => signature,
            Err(e) => return TransactionResult::failed(e.to_string()),
        };
        let call = IPaymentOperator::chargeCall {
            paymentInfo: info.to_onchain(self.payer()),
            amount: U256::from(amount),
            tokenCollector: self.contracts.token_collector,
            collectorData: signature,
        };
        self.dispatch(EscrowAction::Charge, call.abi_encode().into())
            .await
    }

    /// Refund after release.
    ///
    /// Not functional: the refund token collector this call depends on has
    /// not been deployed, so the operator reverts. Refused locally unless the
    /// client was configured with `allow_post_escrow_refund`; use
    /// [`refund_in_escrow`](Self::refund_in_escrow) before releasing instead.
    #[instrument(skip_all, fields(chain_id = self.chain_id, amount))]
    pub async fn refund_post_escrow(
        &self,
        info: &PaymentInfo,
        amount: Option<u128>,
        token_collector: Address,
        collector_data: Bytes,
    ) -> TransactionResult {
        let amount = resolve_amount(info, amount);
        tracing::Span::current().record("amount", amount);
        if !self.allow_post_escrow_refund {
            warn!("refundPostEscrow refused: not functional on chain");
            return TransactionResult::failed(POST_ESCROW_REFUND_DISABLED);
        }
        warn!("Submitting refundPostEscrow; the operator is expected to revert");
        let call = IPaymentOperator::refundPostEscrowCall {
            paymentInfo: info.to_onchain(self.payer()),
            amount: U256::from(amount),
            tokenCollector: token_collector,
            collectorData: collector_data,
        };
        self.dispatch(EscrowAction::RefundPostEscrow, call.abi_encode().into())
            .await
    }

    async fn dispatch(&self, action: EscrowAction, calldata: Bytes) -> TransactionResult {
        let tx = MetaTransaction {
            to: self.contracts.operator,
            calldata,
            gas_limit: self.gas_limit,
        };
        match self.dispatcher.send_transaction(tx).await {
            Ok(outcome) if outcome.status => {
                info!(
                    %action,
                    tx_hash = %outcome.transaction_hash,
                    gas_used = outcome.gas_used,
                    "Operator call confirmed"
                );
                TransactionResult::confirmed(outcome.transaction_hash, outcome.gas_used)
            }
            Ok(outcome) => {
                warn!(
                    %action,
                    tx_hash = %outcome.transaction_hash,
                    gas_used = outcome.gas_used,
                    "Operator call reverted"
                );
                TransactionResult::reverted(outcome.transaction_hash, outcome.gas_used)
            }
            Err(e) => {
                warn!(%action, error = %e, "Operator call failed");
                TransactionResult::failed(e.to_string())
            }
        }
    }
}

/// A settle response counts as successful only with a transaction hash.
fn settle_failure_reason(response: &SettleResponse) -> String {
    if response.success {
        "Facilitator reported success without a transaction hash".to_string()
    } else {
        response.failure_reason()
    }
}
