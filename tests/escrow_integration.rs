//! Integration tests for the escrow client.
//!
//! The facilitator is mocked with wiremock and on-chain submission with an
//! in-memory dispatcher that records every transaction it is handed.

use std::sync::{Arc, Mutex};

use alloy::primitives::aliases::U120;
use alloy::primitives::{address, Address, Bytes, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_escrow::abi::IPaymentOperator;
use x402_escrow::escrow::POST_ESCROW_REFUND_DISABLED;
use x402_escrow::payment_info::Salt;
use x402_escrow::signer::TransferAuthorization;
use x402_escrow::timestamp::UnixTimestamp;
use x402_escrow::types::{EscrowStateError, REVERTED};
use x402_escrow::{
    AdvancedEscrowClient, EscrowClientConfig, EscrowConfigError, EscrowPhase, MetaTransaction,
    PaymentInfo, TaskTier, TransactionDispatcher, TransactionOutcome,
};

const OPERATOR: Address = address!("0x1111111111111111111111111111111111111111");
const RECEIVER: Address = address!("0x2222222222222222222222222222222222222222");
/// Base Sepolia
const CHAIN_ID: u64 = 84532;
const AMOUNT: u128 = 5_000_000;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MockDispatchError(String);

/// Records submitted transactions and answers with a fixed outcome.
#[derive(Clone)]
struct MockDispatcher {
    sent: Arc<Mutex<Vec<MetaTransaction>>>,
    outcome: Result<TransactionOutcome, String>,
}

impl MockDispatcher {
    fn confirming() -> Self {
        Self::with_outcome(Ok(TransactionOutcome {
            transaction_hash: B256::repeat_byte(0xab),
            gas_used: 84_000,
            status: true,
        }))
    }

    fn with_outcome(outcome: Result<TransactionOutcome, String>) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            outcome,
        }
    }

    fn sent(&self) -> Vec<MetaTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

impl TransactionDispatcher for MockDispatcher {
    type Error = MockDispatchError;

    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<TransactionOutcome, MockDispatchError> {
        self.sent.lock().unwrap().push(tx);
        self.outcome.clone().map_err(MockDispatchError)
    }
}

type TestClient = AdvancedEscrowClient<PrivateKeySigner, MockDispatcher>;

fn config(facilitator: &MockServer) -> EscrowClientConfig {
    EscrowClientConfig::new(CHAIN_ID)
        .with_facilitator_url(facilitator.uri())
        .with_operator(OPERATOR)
}

fn client_with(
    facilitator: &MockServer,
    dispatcher: MockDispatcher,
    config_fn: impl FnOnce(EscrowClientConfig) -> EscrowClientConfig,
) -> TestClient {
    AdvancedEscrowClient::new(
        PrivateKeySigner::random(),
        dispatcher,
        &config_fn(config(facilitator)),
    )
    .unwrap()
}

fn payment_info(client: &TestClient) -> PaymentInfo {
    client
        .build_payment_info(
            RECEIVER,
            AMOUNT,
            TaskTier::Standard,
            Some("0x2a".parse::<Salt>().unwrap()),
            0,
            800,
        )
        .unwrap()
}

async fn mount_settle(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests.last().expect("no request received");
    serde_json::from_slice(&request.body).unwrap()
}

fn address_at(value: &Value) -> Address {
    value.as_str().unwrap().parse().unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn test_construction_fails_on_unknown_chain() {
    let server = MockServer::start().await;
    let config = EscrowClientConfig::new(31337).with_facilitator_url(server.uri());
    let result = AdvancedEscrowClient::new(
        PrivateKeySigner::random(),
        MockDispatcher::confirming(),
        &config,
    );
    let err = result.err().expect("unknown chain must fail");
    let message = err.to_string();
    assert!(message.contains("31337"));
    assert!(message.contains("8453 (Base Mainnet)"));
}

#[tokio::test]
async fn test_construction_requires_operator_outside_base() {
    let server = MockServer::start().await;
    let config = EscrowClientConfig::new(CHAIN_ID).with_facilitator_url(server.uri());
    let result = AdvancedEscrowClient::new(
        PrivateKeySigner::random(),
        MockDispatcher::confirming(),
        &config,
    );
    match result {
        Err(EscrowConfigError::Contracts(err)) => {
            let message = err.to_string();
            assert!(message.contains("operator address is required"));
            assert!(message.contains("0x97d53e63A9CB97556c00BeFd325AF810c9b267B2"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("missing operator must fail"),
    }
}

#[tokio::test]
async fn test_build_payment_info_uses_resolved_contracts() {
    let server = MockServer::start().await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let before = UnixTimestamp::now();
    let info = payment_info(&client);

    assert_eq!(info.operator(), OPERATOR);
    assert_eq!(info.fee_receiver(), OPERATOR);
    assert_eq!(info.receiver(), RECEIVER);
    assert_eq!(
        info.token(),
        address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e")
    );
    assert_eq!(info.max_amount(), AMOUNT);
    assert!(info.pre_approval_expiry() >= before + 7_200);
    assert_eq!(info.refund_expiry() - info.pre_approval_expiry(), 604_800 - 7_200);
}

// ============================================================================
// Authorize
// ============================================================================

#[tokio::test]
async fn test_authorize_success_and_request_shape() {
    let server = MockServer::start().await;
    mount_settle(&server, 200, json!({"success": true, "transaction": "0xfeed"})).await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.authorize(&info).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.transaction_hash.as_deref(), Some("0xfeed"));
    assert_eq!(result.payment_info.as_ref(), Some(&info));
    assert_eq!(result.salt, Some(info.salt()));

    let body = last_request_body(&server).await;
    assert_eq!(body["x402Version"], 2);
    assert_eq!(body["scheme"], "escrow");

    let requirements = &body["paymentRequirements"];
    assert_eq!(requirements["scheme"], "escrow");
    assert_eq!(requirements["network"], "eip155:84532");
    assert_eq!(requirements["maxAmountRequired"], "5000000");
    assert_eq!(address_at(&requirements["payTo"]), RECEIVER);
    assert_eq!(address_at(&requirements["asset"]), info.token());
    let contracts = client.contracts();
    assert_eq!(address_at(&requirements["extra"]["escrowAddress"]), contracts.escrow);
    assert_eq!(address_at(&requirements["extra"]["operatorAddress"]), OPERATOR);
    assert_eq!(
        address_at(&requirements["extra"]["tokenCollector"]),
        contracts.token_collector
    );

    let authorization = &body["payload"]["authorization"];
    assert_eq!(address_at(&authorization["from"]), client.payer());
    assert_eq!(address_at(&authorization["to"]), contracts.token_collector);
    assert_eq!(authorization["value"], "5000000");
    assert_eq!(authorization["validAfter"], "0");
    assert_eq!(
        authorization["validBefore"],
        info.pre_approval_expiry().to_string()
    );
    let nonce: B256 = authorization["nonce"].as_str().unwrap().parse().unwrap();
    assert_eq!(nonce, client.compute_nonce(&info));

    let payload_info: PaymentInfo =
        serde_json::from_value(body["payload"]["paymentInfo"].clone()).unwrap();
    assert_eq!(payload_info, info);

    // The signature recovers to the payer under the token's EIP-712 domain.
    let signature: Bytes = body["payload"]["signature"].as_str().unwrap().parse().unwrap();
    assert_eq!(signature.len(), 65);
    let signature = Signature::try_from(&signature[..]).unwrap();
    let hash = TransferAuthorization {
        from: client.payer(),
        to: contracts.token_collector,
        value: U256::from(AMOUNT),
        valid_after: UnixTimestamp::from_secs(0),
        valid_before: info.pre_approval_expiry(),
        nonce,
    }
    .signing_hash(&contracts.token_domain, CHAIN_ID, info.token());
    assert_eq!(
        signature.recover_address_from_prehash(&hash).unwrap(),
        client.payer()
    );
}

#[tokio::test]
async fn test_authorize_reports_facilitator_rejection() {
    let server = MockServer::start().await;
    mount_settle(
        &server,
        400,
        json!({"success": false, "errorReason": "insufficient_balance"}),
    )
    .await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.authorize(&info).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("insufficient_balance"));
    assert!(result.transaction_hash.is_none());
    assert!(result.payment_info.is_none());
}

#[tokio::test]
async fn test_authorize_falls_back_to_error_field_then_unknown() {
    let server = MockServer::start().await;
    mount_settle(&server, 200, json!({"success": false, "error": "expired"})).await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);
    let result = client.authorize(&info).await;
    assert_eq!(result.error.as_deref(), Some("expired"));

    server.reset().await;
    mount_settle(&server, 200, json!({"success": false})).await;
    let result = client.authorize(&info).await;
    assert_eq!(result.error.as_deref(), Some("Unknown error"));
}

#[tokio::test]
async fn test_authorize_keeps_reason_when_success_is_absent() {
    let server = MockServer::start().await;
    mount_settle(&server, 200, json!({"errorReason": "insufficient_balance"})).await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.authorize(&info).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("insufficient_balance"));
}

#[tokio::test]
async fn test_authorize_reports_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.authorize(&info).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("502"), "{error}");
}

// ============================================================================
// Gasless actions
// ============================================================================

#[tokio::test]
async fn test_release_via_facilitator_defaults_to_max_amount() {
    let server = MockServer::start().await;
    mount_settle(&server, 200, json!({"success": true, "transaction": "0xbeef"})).await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    let result = client.release_via_facilitator(&info, None).await;
    assert!(result.success);
    assert_eq!(result.transaction_hash.as_deref(), Some("0xbeef"));
    assert!(result.gas_used.is_none());
    assert!(dispatcher.sent().is_empty());

    let body = last_request_body(&server).await;
    assert_eq!(body["x402Version"], 2);
    assert_eq!(body["scheme"], "escrow");
    assert_eq!(body["action"], "release");
    assert_eq!(body["payload"]["amount"], "5000000");
    assert_eq!(address_at(&body["payload"]["payer"]), client.payer());
    assert_eq!(body["paymentRequirements"]["network"], "eip155:84532");
    assert!(body["paymentRequirements"].get("maxAmountRequired").is_none());
    assert_eq!(
        address_at(&body["paymentRequirements"]["extra"]["operatorAddress"]),
        OPERATOR
    );
}

#[tokio::test]
async fn test_refund_via_facilitator_honours_zero_amount() {
    let server = MockServer::start().await;
    mount_settle(&server, 200, json!({"success": true, "transaction": "0xbeef"})).await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.refund_via_facilitator(&info, Some(0)).await;
    assert!(result.success);

    let body = last_request_body(&server).await;
    assert_eq!(body["action"], "refundInEscrow");
    assert_eq!(body["payload"]["amount"], "0");
}

#[tokio::test]
async fn test_gasless_rejection_is_reported() {
    let server = MockServer::start().await;
    mount_settle(
        &server,
        400,
        json!({"success": false, "errorReason": "unsupported_action"}),
    )
    .await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let result = client.release_via_facilitator(&info, Some(1_000)).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("unsupported_action"));
}

// ============================================================================
// Escrow state
// ============================================================================

#[tokio::test]
async fn test_query_escrow_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/escrow/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "capturableAmount": "5000000",
            "refundableAmount": "0",
            "hasCollectedPayment": true,
        })))
        .mount(&server)
        .await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let snapshot = client.query_escrow_state(&info).await.unwrap();
    assert_eq!(snapshot.capturable_amount.0, AMOUNT);
    assert_eq!(snapshot.refundable_amount.0, 0);
    assert!(snapshot.has_collected_payment);
    assert_eq!(snapshot.phase(), EscrowPhase::Authorized);

    let body = last_request_body(&server).await;
    assert_eq!(body["network"], "eip155:84532");
    assert_eq!(address_at(&body["payer"]), client.payer());
    assert_eq!(body["paymentInfo"]["maxAmount"], "5000000");
    assert_eq!(
        address_at(&body["extra"]["escrowAddress"]),
        client.contracts().escrow
    );
}

#[tokio::test]
async fn test_query_escrow_state_raises_facilitator_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/escrow/state"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "payment not found"})),
        )
        .mount(&server)
        .await;
    let client = client_with(&server, MockDispatcher::confirming(), |c| c);
    let info = payment_info(&client);

    let err = client.query_escrow_state(&info).await.unwrap_err();
    assert!(matches!(err, EscrowStateError::Facilitator(ref reason) if reason == "payment not found"));
    assert_eq!(
        err.to_string(),
        "Escrow state query failed: payment not found"
    );
}

// ============================================================================
// Direct operations
// ============================================================================

#[tokio::test]
async fn test_release_submits_operator_call() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c.with_gas_limit(250_000));
    let info = payment_info(&client);

    let result = client.release(&info, None).await;
    assert!(result.success);
    assert_eq!(
        result.transaction_hash,
        Some(B256::repeat_byte(0xab).to_string())
    );
    assert_eq!(result.gas_used, Some(84_000));
    assert!(result.error.is_none());

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, OPERATOR);
    assert_eq!(sent[0].gas_limit, 250_000);
    let call = IPaymentOperator::releaseCall::abi_decode(&sent[0].calldata).unwrap();
    assert_eq!(call.amount, U256::from(AMOUNT));
    assert_eq!(call.paymentInfo, info.to_onchain(client.payer()));
    assert_eq!(call.paymentInfo.payer, client.payer());
}

#[tokio::test]
async fn test_repeated_release_is_not_deduplicated() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    client.release(&info, Some(1_000)).await;
    client.release(&info, Some(1_000)).await;
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn test_refund_in_escrow_encodes_uint120_amount() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    let result = client.refund_in_escrow(&info, Some(1_000)).await;
    assert!(result.success);
    let sent = dispatcher.sent();
    let call = IPaymentOperator::refundInEscrowCall::abi_decode(&sent[0].calldata).unwrap();
    assert_eq!(call.amount, U120::from(1_000u64));
}

#[tokio::test]
async fn test_refund_in_escrow_rejects_amount_above_uint120() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    let result = client.refund_in_escrow(&info, Some(1u128 << 120)).await;
    assert!(!result.success);
    assert!(result.transaction_hash.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("uint120"), "{error}");
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_charge_passes_signature_as_collector_data() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    let result = client.charge(&info, Some(2_000_000)).await;
    assert!(result.success);

    let sent = dispatcher.sent();
    let call = IPaymentOperator::chargeCall::abi_decode(&sent[0].calldata).unwrap();
    assert_eq!(call.amount, U256::from(2_000_000u64));
    assert_eq!(call.tokenCollector, client.contracts().token_collector);
    assert_eq!(call.collectorData.len(), 65);

    // Signed for the charged amount, not the maximum.
    let signature = Signature::try_from(&call.collectorData[..]).unwrap();
    let hash = TransferAuthorization {
        from: client.payer(),
        to: client.contracts().token_collector,
        value: U256::from(2_000_000u64),
        valid_after: UnixTimestamp::from_secs(0),
        valid_before: info.pre_approval_expiry(),
        nonce: client.compute_nonce(&info),
    }
    .signing_hash(&client.contracts().token_domain, CHAIN_ID, info.token());
    assert_eq!(
        signature.recover_address_from_prehash(&hash).unwrap(),
        client.payer()
    );
}

#[tokio::test]
async fn test_reverted_receipt_is_a_failure() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::with_outcome(Ok(TransactionOutcome {
        transaction_hash: B256::repeat_byte(0xcd),
        gas_used: 21_000,
        status: false,
    }));
    let client = client_with(&server, dispatcher, |c| c);
    let info = payment_info(&client);

    let result = client.release(&info, None).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(REVERTED));
    assert_eq!(
        result.transaction_hash,
        Some(B256::repeat_byte(0xcd).to_string())
    );
    assert_eq!(result.gas_used, Some(21_000));
}

#[tokio::test]
async fn test_dispatch_error_is_a_failure() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::with_outcome(Err("nonce too low".to_string()));
    let client = client_with(&server, dispatcher, |c| c);
    let info = payment_info(&client);

    let result = client.refund_in_escrow(&info, None).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("nonce too low"));
    assert!(result.transaction_hash.is_none());
    assert!(result.gas_used.is_none());
}

#[tokio::test]
async fn test_refund_post_escrow_is_refused_by_default() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c);
    let info = payment_info(&client);

    let result = client
        .refund_post_escrow(&info, None, Address::ZERO, Bytes::new())
        .await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(POST_ESCROW_REFUND_DISABLED));
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_refund_post_escrow_dispatches_when_enabled() {
    let server = MockServer::start().await;
    let dispatcher = MockDispatcher::confirming();
    let client = client_with(&server, dispatcher.clone(), |c| c.with_post_escrow_refund(true));
    let info = payment_info(&client);

    let result = client
        .refund_post_escrow(&info, Some(500), Address::ZERO, Bytes::new())
        .await;
    assert!(result.success);
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    let call = IPaymentOperator::refundPostEscrowCall::abi_decode(&sent[0].calldata).unwrap();
    assert_eq!(call.amount, U256::from(500u64));
    assert_eq!(call.tokenCollector, Address::ZERO);
    assert!(call.collectorData.is_empty());
}
