//! Client for x402 Advanced Escrow payments.
//!
//! A payer locks stablecoin in the commerce-payments escrow through an x402
//! facilitator, then releases it to the receiver or refunds it, directly on
//! chain or gaslessly through the facilitator.
//!
//! # Modules
//!
//! - [`registry`]: escrow contract addresses per chain and operator resolution.
//! - [`payment_info`]: the `PaymentInfo` commitment, its builder and tier timings.
//! - [`nonce`]: the deterministic ERC-3009 nonce bound to a payment.
//! - [`signer`]: EIP-712 `ReceiveWithAuthorization` signing.
//! - [`escrow`]: [`AdvancedEscrowClient`], the operations of the escrow lifecycle.
//! - [`dispatcher`]: direct submission of operator calls over JSON-RPC.
//! - [`facilitator_client`]: HTTP client for the facilitator escrow endpoints.
//! - [`lifecycle`]: escrow phases and the legal moves between them.
//! - [`network`]: known EVM networks and their USDC deployments.
//! - [`config`] and [`from_env`]: client configuration.
//!
//! # Example
//!
//! ```no_run
//! use alloy::primitives::address;
//! use alloy::signers::local::PrivateKeySigner;
//! use x402_escrow::{AdvancedEscrowClient, EscrowClientConfig, TaskTier};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let signer: PrivateKeySigner = std::env::var("EVM_PRIVATE_KEY")?.parse()?;
//! let client = AdvancedEscrowClient::connect(signer, &EscrowClientConfig::default())?;
//! let info = client.build_payment_info(
//!     address!("0x1111111111111111111111111111111111111111"),
//!     5_000_000,
//!     TaskTier::Standard,
//!     None,
//!     0,
//!     800,
//! )?;
//! let authorized = client.authorize(&info).await;
//! if authorized.success {
//!     let released = client.release(&info, None).await;
//!     println!("{released:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod caip2;
pub mod config;
pub mod dispatcher;
pub mod escrow;
pub mod facilitator_client;
pub mod from_env;
pub mod lifecycle;
pub mod network;
pub mod nonce;
pub mod payment_info;
pub mod registry;
pub mod signer;
pub mod telemetry;
pub mod timestamp;
pub mod types;

pub use config::{EscrowClientConfig, EscrowConfigError};
pub use dispatcher::{MetaTransaction, RpcDispatcher, TransactionDispatcher, TransactionOutcome};
pub use escrow::AdvancedEscrowClient;
pub use lifecycle::{EscrowAction, EscrowPhase};
pub use payment_info::{PaymentInfo, Salt, TaskTier};
pub use registry::EscrowContracts;
pub use signer::SignerLike;
pub use types::{AuthorizationResult, EscrowStateSnapshot, TransactionResult};
