//! Solidity bindings for the commerce-payments escrow and ERC-3009 tokens.
//!
//! The `PaymentInfo` tuple layout is a wire-format constant shared with the
//! deployed `AuthCaptureEscrow`: field order and integer widths must not change.

use alloy::sol;

// ============================================================================
// Escrow Types
// ============================================================================

sol! {
    /// On-chain payment commitment as stored by `AuthCaptureEscrow`.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct PaymentInfo {
        address operator;
        address payer;
        address receiver;
        address token;
        uint120 maxAmount;
        uint48 preApprovalExpiry;
        uint48 authorizationExpiry;
        uint48 refundExpiry;
        uint16 minFeeBps;
        uint16 maxFeeBps;
        address feeReceiver;
        uint256 salt;
    }

    /// Entry points of a `PaymentOperator` instance used by the client.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IPaymentOperator {
        function release(PaymentInfo paymentInfo, uint256 amount) external;
        function refundInEscrow(PaymentInfo paymentInfo, uint120 amount) external;
        function charge(
            PaymentInfo paymentInfo,
            uint256 amount,
            address tokenCollector,
            bytes collectorData
        ) external;
        function refundPostEscrow(
            PaymentInfo paymentInfo,
            uint256 amount,
            address tokenCollector,
            bytes collectorData
        ) external;
    }
}

// ============================================================================
// ERC-3009
// ============================================================================

sol! {
    /// EIP-712 message for `receiveWithAuthorization`.
    ///
    /// Only the payee named in `to` may submit it, which is why the escrow
    /// routes authorizations through the token collector.
    #[allow(missing_docs)]
    #[derive(Debug)]
    struct ReceiveWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}
