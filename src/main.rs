//! x402 Advanced Escrow command line.
//!
//! Drives the escrow lifecycle from a shell: build a `PaymentInfo`, authorize
//! it through the facilitator, then release, refund or charge it. Results are
//! printed to stdout as JSON; logs go to stderr.
//!
//! Payment records are exchanged as JSON files in the facilitator camelCase
//! format, as printed by `build`. `chains`, `build` and `nonce` work offline
//! and need no private key.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `EVM_PRIVATE_KEY`, `ESCROW_CHAIN_ID`, `FACILITATOR_URL`, `RPC_URL*` and
//!   the other variables read by `from_env`
//! - `RUST_LOG` controls log verbosity

use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use x402_escrow::dispatcher::RpcDispatcher;
use x402_escrow::escrow;
use x402_escrow::from_env;
use x402_escrow::nonce;
use x402_escrow::payment_info::{DEFAULT_MAX_FEE_BPS, DEFAULT_MIN_FEE_BPS};
use x402_escrow::registry;
use x402_escrow::telemetry::Telemetry;
use x402_escrow::{AdvancedEscrowClient, EscrowClientConfig, PaymentInfo, Salt, TaskTier};

type Client = AdvancedEscrowClient<PrivateKeySigner, RpcDispatcher>;

#[derive(Parser, Debug)]
#[command(name = "x402-escrow", version, about = "x402 Advanced Escrow client")]
struct Cli {
    /// Chain to operate on; overrides ESCROW_CHAIN_ID.
    #[arg(long, global = true)]
    chain_id: Option<u64>,
    /// PaymentOperator instance; overrides ESCROW_OPERATOR_ADDRESS.
    #[arg(long, global = true)]
    operator: Option<Address>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List chains with escrow deployments.
    Chains,
    /// Build a PaymentInfo with tier-based expiries.
    Build {
        #[arg(long)]
        receiver: Address,
        /// Maximum amount in token atomic units.
        #[arg(long)]
        amount: u128,
        #[arg(long, default_value_t = TaskTier::Standard)]
        tier: TaskTier,
        /// 0x-prefixed hex or decimal; random when omitted.
        #[arg(long)]
        salt: Option<Salt>,
        #[arg(long, default_value_t = DEFAULT_MIN_FEE_BPS)]
        min_fee_bps: u16,
        #[arg(long, default_value_t = DEFAULT_MAX_FEE_BPS)]
        max_fee_bps: u16,
    },
    /// Print the ERC-3009 nonce of a PaymentInfo.
    Nonce(PaymentArgs),
    /// Lock funds in escrow through the facilitator.
    Authorize(PaymentArgs),
    /// Release escrowed funds to the receiver (payer pays gas).
    Release(AmountArgs),
    /// Refund escrowed funds to the payer (payer pays gas).
    Refund(AmountArgs),
    /// Pay the receiver directly, without escrow hold.
    Charge(AmountArgs),
    /// Refund after release. Refused unless ENABLE_POST_ESCROW_REFUND is set.
    RefundPostEscrow {
        #[command(flatten)]
        args: AmountArgs,
        #[arg(long)]
        token_collector: Option<Address>,
        /// 0x-prefixed hex.
        #[arg(long)]
        collector_data: Option<Bytes>,
    },
    /// Release through the facilitator, which pays gas.
    ReleaseGasless(AmountArgs),
    /// Refund in escrow through the facilitator, which pays gas.
    RefundGasless(AmountArgs),
    /// Query escrow balances through the facilitator.
    State(PaymentArgs),
}

#[derive(Args, Debug)]
struct PaymentArgs {
    /// JSON file holding the PaymentInfo.
    #[arg(long = "payment-info")]
    payment_info: PathBuf,
}

#[derive(Args, Debug)]
struct AmountArgs {
    #[command(flatten)]
    payment: PaymentArgs,
    /// Amount in token atomic units; defaults to the full max amount.
    #[arg(long)]
    amount: Option<u128>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let cli = Cli::parse();
    let mut config = from_env::config_from_env()?;
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(operator) = cli.operator {
        config.operator = Some(operator);
    }

    let succeeded = match cli.command {
        Command::Chains => {
            print_chains()?;
            true
        }
        Command::Build {
            receiver,
            amount,
            tier,
            salt,
            min_fee_bps,
            max_fee_bps,
        } => {
            let contracts = config.resolve_contracts()?;
            let info = escrow::payment_info_for(
                &contracts,
                receiver,
                amount,
                tier,
                salt,
                min_fee_bps,
                max_fee_bps,
            )?;
            print_json(&info)?;
            true
        }
        Command::Nonce(args) => {
            let contracts = config.resolve_contracts()?;
            let info = read_payment_info(&args.payment_info)?;
            println!(
                "{}",
                nonce::compute_nonce(&info, config.chain_id, contracts.escrow)
            );
            true
        }
        Command::Authorize(args) => {
            let (client, info) = load(&config, &args)?;
            let result = client.authorize(&info).await;
            print_json(&result)?;
            result.success
        }
        Command::Release(args) => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client.release(&info, args.amount).await;
            print_json(&result)?;
            result.success
        }
        Command::Refund(args) => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client.refund_in_escrow(&info, args.amount).await;
            print_json(&result)?;
            result.success
        }
        Command::Charge(args) => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client.charge(&info, args.amount).await;
            print_json(&result)?;
            result.success
        }
        Command::RefundPostEscrow {
            args,
            token_collector,
            collector_data,
        } => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client
                .refund_post_escrow(
                    &info,
                    args.amount,
                    token_collector.unwrap_or(Address::ZERO),
                    collector_data.unwrap_or_default(),
                )
                .await;
            print_json(&result)?;
            result.success
        }
        Command::ReleaseGasless(args) => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client.release_via_facilitator(&info, args.amount).await;
            print_json(&result)?;
            result.success
        }
        Command::RefundGasless(args) => {
            let (client, info) = load(&config, &args.payment)?;
            let result = client.refund_via_facilitator(&info, args.amount).await;
            print_json(&result)?;
            result.success
        }
        Command::State(args) => {
            let (client, info) = load(&config, &args)?;
            let snapshot = client.query_escrow_state(&info).await?;
            let mut value = serde_json::to_value(snapshot)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("phase".to_string(), snapshot.phase().to_string().into());
            }
            print_json(&value)?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn connect(config: &EscrowClientConfig) -> Result<Client, Box<dyn std::error::Error>> {
    let signer = from_env::signer_from_env()?;
    Ok(AdvancedEscrowClient::connect(signer, config)?)
}

fn load(
    config: &EscrowClientConfig,
    args: &PaymentArgs,
) -> Result<(Client, PaymentInfo), Box<dyn std::error::Error>> {
    let client = connect(config)?;
    let info = read_payment_info(&args.payment_info)?;
    Ok((client, info))
}

fn read_payment_info(path: &Path) -> Result<PaymentInfo, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let info = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid PaymentInfo in {}: {e}", path.display()))?;
    Ok(info)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainEntry {
    chain_id: u64,
    name: &'static str,
    escrow: Address,
    operator_factory: Address,
    token_collector: Address,
    protocol_fee_config: Address,
    refund_request: Address,
    token: Address,
}

fn print_chains() -> Result<(), Box<dyn std::error::Error>> {
    let entries = registry::supported_chains()
        .into_iter()
        .map(|chain_id| {
            let contracts = registry::resolve(chain_id)?;
            Ok(ChainEntry {
                chain_id,
                name: registry::chain_name(chain_id),
                escrow: contracts.escrow,
                operator_factory: contracts.operator_factory,
                token_collector: contracts.token_collector,
                protocol_fee_config: contracts.protocol_fee_config,
                refund_request: contracts.refund_request,
                token: contracts.token,
            })
        })
        .collect::<Result<Vec<_>, registry::UnsupportedChain>>()?;
    print_json(&entries)?;
    Ok(())
}
