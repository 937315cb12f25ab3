//! Wire types for the facilitator escrow endpoints and operation results.
//!
//! Each endpoint gets its own request struct so that field presence is checked
//! by serde at the boundary instead of by hand. Amounts are native integers in
//! memory and decimal strings on the wire.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

use crate::caip2::Caip2NetworkId;
use crate::lifecycle::EscrowPhase;
use crate::payment_info::{PaymentInfo, Salt};
use crate::signer::TransferAuthorization;
use crate::timestamp::UnixTimestamp;

/// Protocol version sent in every settle request.
pub const X402_VERSION: u8 = 2;

/// Oldest facilitator release that accepts gasless escrow actions and `/escrow/state`.
pub const MIN_FACILITATOR_VERSION: &str = "1.32.0";

// ============================================================================
// Primitives
// ============================================================================

/// Payment scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    #[serde(rename = "escrow")]
    Escrow,
}

/// Token amount in atomic units, serialized as a decimal string.
///
/// Deserializes from either a string or a JSON number, since facilitators
/// are not consistent about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(pub u128);

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        TokenAmount(value)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .trim()
                .parse::<u128>()
                .map(TokenAmount)
                .map_err(|_| serde::de::Error::custom(format!("invalid token amount {s:?}"))),
            Raw::Number(n) => Ok(TokenAmount(n as u128)),
        }
    }
}

/// Contract addresses the facilitator needs to route an escrow settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowExtra {
    /// `AuthCaptureEscrow` contract
    pub escrow_address: Address,
    /// `PaymentOperator` instance
    pub operator_address: Address,
    /// ERC-3009 token collector that receives the signed authorization
    pub token_collector: Address,
}

// ============================================================================
// POST /settle: authorize
// ============================================================================

/// ERC-3009 authorization in facilitator format.
///
/// `value`, `validAfter` and `validBefore` are decimal strings, `nonce` is 0x-hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationWire {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
    #[serde(with = "crate::timestamp::as_string")]
    pub valid_after: UnixTimestamp,
    #[serde(with = "crate::timestamp::as_string")]
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

impl AuthorizationWire {
    /// `value` must fit in 128 bits; escrow amounts are bounded to uint120.
    pub fn new(authorization: &TransferAuthorization) -> Self {
        AuthorizationWire {
            from: authorization.from,
            to: authorization.to,
            value: TokenAmount(authorization.value.saturating_to::<u128>()),
            valid_after: authorization.valid_after,
            valid_before: authorization.valid_before,
            nonce: authorization.nonce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizePayload {
    pub authorization: AuthorizationWire,
    /// 65-byte payer signature, 0x-hex
    pub signature: Bytes,
    pub payment_info: PaymentInfo,
}

/// Requirements block of an authorize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequirements {
    pub scheme: Scheme,
    /// CAIP-2 network, e.g. `eip155:8453`
    pub network: Caip2NetworkId,
    pub max_amount_required: TokenAmount,
    /// Settlement token
    pub asset: Address,
    /// The payment receiver
    pub pay_to: Address,
    pub extra: EscrowExtra,
}

/// Body of `POST /settle` that locks funds in escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeSettleRequest {
    pub x402_version: u8,
    pub scheme: Scheme,
    pub payload: AuthorizePayload,
    pub payment_requirements: AuthorizeRequirements,
}

// ============================================================================
// POST /settle: gasless actions
// ============================================================================

/// Escrow action the facilitator executes and pays gas for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleAction {
    #[serde(rename = "release")]
    Release,
    #[serde(rename = "refundInEscrow")]
    RefundInEscrow,
}

impl Display for SettleAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SettleAction::Release => f.write_str("release"),
            SettleAction::RefundInEscrow => f.write_str("refundInEscrow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub payment_info: PaymentInfo,
    pub payer: Address,
    pub amount: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequirements {
    pub scheme: Scheme,
    pub network: Caip2NetworkId,
    pub extra: EscrowExtra,
}

/// Body of `POST /settle` carrying a gasless `release` or `refundInEscrow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSettleRequest {
    pub x402_version: u8,
    pub scheme: Scheme,
    pub action: SettleAction,
    pub payload: ActionPayload,
    pub payment_requirements: ActionRequirements,
}

/// Response of `POST /settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Absent reads as `false`, keeping any `errorReason` that came with it.
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettleResponse {
    /// The facilitator's stated reason, preferring `errorReason`.
    pub fn failure_reason(&self) -> String {
        self.error_reason
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

// ============================================================================
// POST /escrow/state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowStateRequest {
    pub payment_info: PaymentInfo,
    pub payer: Address,
    pub network: Caip2NetworkId,
    pub extra: EscrowExtra,
}

/// Raw `/escrow/state` response. Either the state fields or an error is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowStateResponse {
    #[serde(default)]
    pub capturable_amount: Option<TokenAmount>,
    #[serde(default)]
    pub refundable_amount: Option<TokenAmount>,
    #[serde(default)]
    pub has_collected_payment: Option<bool>,
    #[serde(default)]
    pub error_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Escrow balances of one payment, as read on chain by the facilitator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowStateSnapshot {
    /// Still locked and releasable to the receiver
    pub capturable_amount: TokenAmount,
    /// Captured and still refundable to the payer
    pub refundable_amount: TokenAmount,
    pub has_collected_payment: bool,
}

impl EscrowStateSnapshot {
    /// Phase implied by the balances.
    pub fn phase(&self) -> EscrowPhase {
        if !self.has_collected_payment {
            EscrowPhase::Uninitialized
        } else if self.capturable_amount.0 > 0 {
            EscrowPhase::Authorized
        } else if self.refundable_amount.0 > 0 {
            EscrowPhase::Released
        } else {
            EscrowPhase::Refunded
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EscrowStateError {
    #[error("Escrow state query failed: {0}")]
    Facilitator(String),
    #[error(transparent)]
    Transport(#[from] crate::facilitator_client::FacilitatorClientError),
    #[error("Escrow state response is missing `{0}`")]
    MissingField(&'static str),
}

impl TryFrom<EscrowStateResponse> for EscrowStateSnapshot {
    type Error = EscrowStateError;

    fn try_from(response: EscrowStateResponse) -> Result<Self, Self::Error> {
        if let Some(reason) = response.error_reason.or(response.error) {
            return Err(EscrowStateError::Facilitator(reason));
        }
        Ok(EscrowStateSnapshot {
            capturable_amount: response
                .capturable_amount
                .ok_or(EscrowStateError::MissingField("capturableAmount"))?,
            refundable_amount: response
                .refundable_amount
                .ok_or(EscrowStateError::MissingField("refundableAmount"))?,
            has_collected_payment: response
                .has_collected_payment
                .ok_or(EscrowStateError::MissingField("hasCollectedPayment"))?,
        })
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// Outcome of [`authorize`](crate::escrow::AdvancedEscrowClient::authorize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// The authorized payment, kept for the later release or refund.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_info: Option<PaymentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<Salt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthorizationResult {
    pub fn authorized(transaction_hash: String, payment_info: PaymentInfo) -> Self {
        AuthorizationResult {
            success: true,
            transaction_hash: Some(transaction_hash),
            salt: Some(payment_info.salt()),
            payment_info: Some(payment_info),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        AuthorizationResult {
            success: false,
            transaction_hash: None,
            payment_info: None,
            salt: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a direct or facilitator-proxied escrow transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error text attached to a mined transaction whose receipt status is 0.
pub const REVERTED: &str = "Transaction reverted";

impl TransactionResult {
    pub fn confirmed(transaction_hash: B256, gas_used: u64) -> Self {
        TransactionResult {
            success: true,
            transaction_hash: Some(transaction_hash.to_string()),
            gas_used: Some(gas_used),
            error: None,
        }
    }

    pub fn reverted(transaction_hash: B256, gas_used: u64) -> Self {
        TransactionResult {
            success: false,
            transaction_hash: Some(transaction_hash.to_string()),
            gas_used: Some(gas_used),
            error: Some(REVERTED.to_string()),
        }
    }

    /// Submitted by the facilitator; gas is not reported.
    pub fn settled(transaction_hash: String) -> Self {
        TransactionResult {
            success: true,
            transaction_hash: Some(transaction_hash),
            gas_used: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        TransactionResult {
            success: false,
            transaction_hash: None,
            gas_used: None,
            error: Some(error.into()),
        }
    }
}
