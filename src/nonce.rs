//! Payment commitment hashing.
//!
//! The escrow identifies an authorization by a nonce derived from the
//! payment tuple, in two stages:
//!
//! ```text
//! struct_hash = keccak256(abi.encode(PAYMENT_INFO_TYPEHASH, paymentInfo))
//! nonce       = keccak256(abi.encode(chainId, escrow, struct_hash))
//! ```
//!
//! The tuple is hashed with `payer = address(0)` so the same commitment can be
//! authorized by any payer. The escrow recomputes the same value on chain;
//! the ERC-3009 authorization must carry it byte for byte.

use alloy::primitives::{b256, keccak256, Address, B256, U256};
use alloy::sol_types::SolValue;

use crate::payment_info::PaymentInfo;

/// `keccak256` of the `PaymentInfo` struct type string, as declared by `AuthCaptureEscrow`.
pub const PAYMENT_INFO_TYPEHASH: B256 =
    b256!("0xae68ac7ce30c86ece8196b61a7c486d8f0061f575037fbd34e7fe4e2820c6591");

/// Payer-agnostic struct hash of `info`.
pub fn payment_info_hash(info: &PaymentInfo) -> B256 {
    let tuple = info.to_onchain(Address::ZERO);
    keccak256((PAYMENT_INFO_TYPEHASH, tuple).abi_encode())
}

/// The nonce the escrow at `escrow` on `chain_id` will derive for `info`.
pub fn compute_nonce(info: &PaymentInfo, chain_id: u64, escrow: Address) -> B256 {
    let struct_hash = payment_info_hash(info);
    keccak256((U256::from(chain_id), escrow, struct_hash).abi_encode())
}
