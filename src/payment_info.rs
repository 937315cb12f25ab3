//! The canonical escrow payment record and its construction helpers.

use alloy::primitives::aliases::{U120, U48};
use alloy::primitives::{Address, U256};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::abi;
use crate::timestamp::UnixTimestamp;

/// Default minimum fee, in basis points.
pub const DEFAULT_MIN_FEE_BPS: u16 = 0;
/// Default maximum fee, in basis points.
pub const DEFAULT_MAX_FEE_BPS: u16 = 800;
/// 100%.
pub const MAX_BPS: u16 = 10_000;

/// Maximum amount per authorization enforced by the deployed operators,
/// in USDC atomic units ($100).
///
/// The client does not check it: an oversized authorization is rejected on
/// chain, so callers should size payments accordingly.
pub const DEPOSIT_LIMIT_USDC: u64 = 100_000_000;

const U48_MAX: u64 = (1 << 48) - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentInfoError {
    #[error("max amount {0} does not fit in uint120")]
    AmountOverflow(u128),
    #[error("{field} {value} does not fit in uint48")]
    TimestampOverflow { field: &'static str, value: u64 },
    #[error("invalid fee bounds: min {min} max {max} (expected 0 <= min <= max <= 10000)")]
    InvalidFeeBounds { min: u16, max: u16 },
    #[error("expiries not set: call `expiries` or `tier`")]
    MissingExpiries,
    #[error("invalid salt {0:?}")]
    InvalidSalt(String),
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
}

// ============================================================================
// Salt
// ============================================================================

/// 256-bit salt that separates otherwise identical payment commitments.
///
/// Parses `0x`-prefixed hex or a plain decimal string; JSON also takes an
/// integer up to `u64::MAX`. Always serializes as `0x` followed by 64 hex
/// digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt(U256);

impl Salt {
    /// 32 bytes from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Salt(U256::from_be_bytes(bytes))
    }

    pub fn from_u256(value: U256) -> Self {
        Salt(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl Display for Salt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.to_be_bytes::<32>()))
    }
}

impl FromStr for Salt {
    type Err = PaymentInfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, radix) = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(digits) => (digits, 16),
            None => (trimmed, 10),
        };
        if digits.is_empty() {
            return Err(PaymentInfoError::InvalidSalt(s.to_string()));
        }
        U256::from_str_radix(digits, radix)
            .map(Salt)
            .map_err(|_| PaymentInfoError::InvalidSalt(s.to_string()))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// JSON integers above `u64::MAX` arrive as lossy floats and are rejected.
impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SaltVisitor;

        impl serde::de::Visitor<'_> for SaltVisitor {
            type Value = Salt;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a 0x-hex or decimal salt string, or an integer up to u64::MAX")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Salt, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Salt, E> {
                Ok(Salt(U256::from(v)))
            }

            fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<Salt, E> {
                Ok(Salt(U256::from(v)))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Salt, E> {
                u64::try_from(v)
                    .map(|v| Salt(U256::from(v)))
                    .map_err(|_| E::custom(format!("negative salt {v}")))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Salt, E> {
                Err(E::custom(format!(
                    "salt {v} is not an exact JSON integer; pass it as a string"
                )))
            }
        }

        deserializer.deserialize_any(SaltVisitor)
    }
}

// ============================================================================
// Task tiers
// ============================================================================

/// Timing profile picked at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskTier {
    /// $0.50-$5 tasks.
    Micro,
    /// $5-$50 tasks.
    Standard,
    /// $50-$200 tasks.
    Premium,
    /// Above $200.
    Enterprise,
}

/// Offsets from "now", in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTimings {
    pub pre_approval: u64,
    pub authorization: u64,
    pub refund: u64,
}

impl TaskTier {
    pub fn timings(&self) -> TierTimings {
        let (pre_approval, authorization, refund) = match self {
            TaskTier::Micro => (3_600, 7_200, 86_400),
            TaskTier::Standard => (7_200, 86_400, 604_800),
            TaskTier::Premium => (14_400, 172_800, 1_209_600),
            TaskTier::Enterprise => (86_400, 604_800, 2_592_000),
        };
        TierTimings {
            pre_approval,
            authorization,
            refund,
        }
    }
}

impl Display for TaskTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskTier::Micro => "micro",
            TaskTier::Standard => "standard",
            TaskTier::Premium => "premium",
            TaskTier::Enterprise => "enterprise",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task tier {0:?}, expected one of micro, standard, premium, enterprise")]
pub struct UnknownTaskTier(String);

impl FromStr for TaskTier {
    type Err = UnknownTaskTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "micro" => Ok(TaskTier::Micro),
            "standard" => Ok(TaskTier::Standard),
            "premium" => Ok(TaskTier::Premium),
            "enterprise" => Ok(TaskTier::Enterprise),
            _ => Err(UnknownTaskTier(s.to_string())),
        }
    }
}

// ============================================================================
// PaymentInfo
// ============================================================================

/// An escrow payment commitment, validated at construction and immutable after.
///
/// Operations that act on a different amount take it as a separate argument.
/// The payer is not part of the record: it is bound later, either to the zero
/// address for the nonce or to the signing account for contract calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    operator: Address,
    receiver: Address,
    token: Address,
    max_amount: u128,
    pre_approval_expiry: UnixTimestamp,
    authorization_expiry: UnixTimestamp,
    refund_expiry: UnixTimestamp,
    min_fee_bps: u16,
    max_fee_bps: u16,
    fee_receiver: Address,
    salt: Salt,
}

impl PaymentInfo {
    pub fn builder(
        operator: Address,
        receiver: Address,
        token: Address,
        max_amount: u128,
    ) -> PaymentInfoBuilder {
        PaymentInfoBuilder {
            operator,
            receiver,
            token,
            max_amount,
            expiries: None,
            min_fee_bps: DEFAULT_MIN_FEE_BPS,
            max_fee_bps: DEFAULT_MAX_FEE_BPS,
            fee_receiver: None,
            salt: None,
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn receiver(&self) -> Address {
        self.receiver
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn max_amount(&self) -> u128 {
        self.max_amount
    }

    pub fn pre_approval_expiry(&self) -> UnixTimestamp {
        self.pre_approval_expiry
    }

    pub fn authorization_expiry(&self) -> UnixTimestamp {
        self.authorization_expiry
    }

    pub fn refund_expiry(&self) -> UnixTimestamp {
        self.refund_expiry
    }

    pub fn min_fee_bps(&self) -> u16 {
        self.min_fee_bps
    }

    pub fn max_fee_bps(&self) -> u16 {
        self.max_fee_bps
    }

    pub fn fee_receiver(&self) -> Address {
        self.fee_receiver
    }

    pub fn salt(&self) -> Salt {
        self.salt
    }

    /// The ABI tuple with `payer` bound.
    ///
    /// Pass [`Address::ZERO`] for the payer-agnostic form hashed into the
    /// nonce, or the signing account for operator calls.
    pub fn to_onchain(&self, payer: Address) -> abi::PaymentInfo {
        abi::PaymentInfo {
            operator: self.operator,
            payer,
            receiver: self.receiver,
            token: self.token,
            maxAmount: U120::saturating_from(self.max_amount),
            preApprovalExpiry: U48::saturating_from(self.pre_approval_expiry.as_secs()),
            authorizationExpiry: U48::saturating_from(self.authorization_expiry.as_secs()),
            refundExpiry: U48::saturating_from(self.refund_expiry.as_secs()),
            minFeeBps: self.min_fee_bps,
            maxFeeBps: self.max_fee_bps,
            feeReceiver: self.fee_receiver,
            salt: self.salt.as_u256(),
        }
    }
}

/// Builder for [`PaymentInfo`]. Expiries are mandatory, everything else has a default.
#[derive(Debug, Clone)]
pub struct PaymentInfoBuilder {
    operator: Address,
    receiver: Address,
    token: Address,
    max_amount: u128,
    expiries: Option<(UnixTimestamp, UnixTimestamp, UnixTimestamp)>,
    min_fee_bps: u16,
    max_fee_bps: u16,
    fee_receiver: Option<Address>,
    salt: Option<Salt>,
}

impl PaymentInfoBuilder {
    pub fn expiries(
        mut self,
        pre_approval: UnixTimestamp,
        authorization: UnixTimestamp,
        refund: UnixTimestamp,
    ) -> Self {
        self.expiries = Some((pre_approval, authorization, refund));
        self
    }

    /// Expiries offset from `now` by the tier's windows.
    pub fn tier(self, tier: TaskTier, now: UnixTimestamp) -> Self {
        let t = tier.timings();
        self.expiries(
            now + t.pre_approval,
            now + t.authorization,
            now + t.refund,
        )
    }

    pub fn fee_bps(mut self, min: u16, max: u16) -> Self {
        self.min_fee_bps = min;
        self.max_fee_bps = max;
        self
    }

    pub fn fee_receiver(mut self, fee_receiver: Address) -> Self {
        self.fee_receiver = Some(fee_receiver);
        self
    }

    pub fn salt(mut self, salt: Salt) -> Self {
        self.salt = Some(salt);
        self
    }

    pub fn build(self) -> Result<PaymentInfo, PaymentInfoError> {
        if self.max_amount >> 120 != 0 {
            return Err(PaymentInfoError::AmountOverflow(self.max_amount));
        }
        let (pre, auth, refund) = self.expiries.ok_or(PaymentInfoError::MissingExpiries)?;
        for (field, ts) in [
            ("preApprovalExpiry", pre),
            ("authorizationExpiry", auth),
            ("refundExpiry", refund),
        ] {
            if ts.as_secs() > U48_MAX {
                return Err(PaymentInfoError::TimestampOverflow {
                    field,
                    value: ts.as_secs(),
                });
            }
        }
        if self.min_fee_bps > self.max_fee_bps || self.max_fee_bps > MAX_BPS {
            return Err(PaymentInfoError::InvalidFeeBounds {
                min: self.min_fee_bps,
                max: self.max_fee_bps,
            });
        }
        Ok(PaymentInfo {
            operator: self.operator,
            receiver: self.receiver,
            token: self.token,
            max_amount: self.max_amount,
            pre_approval_expiry: pre,
            authorization_expiry: auth,
            refund_expiry: refund,
            min_fee_bps: self.min_fee_bps,
            max_fee_bps: self.max_fee_bps,
            fee_receiver: self.fee_receiver.unwrap_or(self.operator),
            salt: self.salt.unwrap_or_else(Salt::random),
        })
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// `paymentInfo` object exchanged with the facilitator.
///
/// `maxAmount` is a decimal string, expiries and fee bounds are numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfoWire {
    pub operator: Address,
    pub receiver: Address,
    pub token: Address,
    pub max_amount: String,
    pub pre_approval_expiry: UnixTimestamp,
    pub authorization_expiry: UnixTimestamp,
    pub refund_expiry: UnixTimestamp,
    pub min_fee_bps: u16,
    pub max_fee_bps: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_receiver: Option<Address>,
    pub salt: Salt,
}

impl From<&PaymentInfo> for PaymentInfoWire {
    fn from(info: &PaymentInfo) -> Self {
        PaymentInfoWire {
            operator: info.operator,
            receiver: info.receiver,
            token: info.token,
            max_amount: info.max_amount.to_string(),
            pre_approval_expiry: info.pre_approval_expiry,
            authorization_expiry: info.authorization_expiry,
            refund_expiry: info.refund_expiry,
            min_fee_bps: info.min_fee_bps,
            max_fee_bps: info.max_fee_bps,
            fee_receiver: Some(info.fee_receiver),
            salt: info.salt,
        }
    }
}

impl TryFrom<PaymentInfoWire> for PaymentInfo {
    type Error = PaymentInfoError;

    fn try_from(wire: PaymentInfoWire) -> Result<Self, Self::Error> {
        let max_amount = wire
            .max_amount
            .trim()
            .parse::<u128>()
            .map_err(|_| PaymentInfoError::InvalidAmount(wire.max_amount.clone()))?;
        let mut builder = PaymentInfo::builder(wire.operator, wire.receiver, wire.token, max_amount)
            .expiries(
                wire.pre_approval_expiry,
                wire.authorization_expiry,
                wire.refund_expiry,
            )
            .fee_bps(wire.min_fee_bps, wire.max_fee_bps)
            .salt(wire.salt);
        if let Some(fee_receiver) = wire.fee_receiver {
            builder = builder.fee_receiver(fee_receiver);
        }
        builder.build()
    }
}

impl Serialize for PaymentInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PaymentInfoWire::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaymentInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = PaymentInfoWire::deserialize(deserializer)?;
        PaymentInfo::try_from(wire).map_err(serde::de::Error::custom)
    }
}
