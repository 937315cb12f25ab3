//! Escrow lifecycle.
//!
//! ```text
//! Uninitialized --authorize--> Authorized --release--------> Released
//!       |                          \-------refundInEscrow--> Refunded
//!       \--------charge-------------------------------------> Released
//! Released --refundPostEscrow (not functional)--> Refunded
//! ```
//!
//! The client itself is stateless; this model is used to validate a planned
//! action against a phase inferred from an [`EscrowStateSnapshot`](crate::types::EscrowStateSnapshot).

use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EscrowPhase {
    /// Nothing collected yet.
    Uninitialized,
    /// Funds locked in escrow.
    Authorized,
    /// Funds captured by the receiver.
    Released,
    /// Funds returned to the payer.
    Refunded,
}

impl EscrowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowPhase::Released | EscrowPhase::Refunded)
    }
}

impl Display for EscrowPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EscrowPhase::Uninitialized => "uninitialized",
            EscrowPhase::Authorized => "authorized",
            EscrowPhase::Released => "released",
            EscrowPhase::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EscrowAction {
    Authorize,
    Release,
    RefundInEscrow,
    Charge,
    RefundPostEscrow,
}

impl EscrowAction {
    /// The operator function this action calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowAction::Authorize => "authorize",
            EscrowAction::Release => "release",
            EscrowAction::RefundInEscrow => "refundInEscrow",
            EscrowAction::Charge => "charge",
            EscrowAction::RefundPostEscrow => "refundPostEscrow",
        }
    }

    /// `refundPostEscrow` needs a refund token collector that the protocol has
    /// not deployed yet; the call reverts on every chain.
    pub fn is_functional(&self) -> bool {
        !matches!(self, EscrowAction::RefundPostEscrow)
    }
}

impl Display for EscrowAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a payment that is {phase}")]
pub struct IllegalTransition {
    pub phase: EscrowPhase,
    pub action: EscrowAction,
}

/// The phase reached by applying `action` in `phase`.
pub fn transition(
    phase: EscrowPhase,
    action: EscrowAction,
) -> Result<EscrowPhase, IllegalTransition> {
    use EscrowAction::*;
    use EscrowPhase::*;
    match (phase, action) {
        (Uninitialized, Authorize) => Ok(Authorized),
        (Uninitialized, Charge) => Ok(Released),
        (Authorized, Release) => Ok(Released),
        (Authorized, RefundInEscrow) => Ok(Refunded),
        (Released, RefundPostEscrow) => Ok(Refunded),
        (phase, action) => Err(IllegalTransition { phase, action }),
    }
}
