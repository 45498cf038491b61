//! Stable payment error taxonomy.
//!
//! [`ErrorCode`] values are persisted on attempt and event rows and
//! returned to clients verbatim, so their string forms must never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable, client-visible reason attached to a payment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Requested amount is outside the configured bounds.
    AmountOutOfBounds,
    /// The intent expired before a transaction was submitted.
    IntentExpired,
    /// The transaction hash already funds another attempt.
    ConflictTxBoundElsewhere,
    /// Decoded transfer sender differs from the tenant's wallet.
    SenderMismatch,
    /// Decoded transfer recipient differs from the canonical recipient.
    RecipientMismatch,
    /// No transfer event from the canonical token contract was found.
    TokenTransferNotFound,
    /// Transferred amount is below the expected amount.
    AmountMismatch,
    /// The transaction reverted on-chain.
    TxReverted,
    /// The transaction never confirmed within the polling window.
    ReceiptNotFound,
    /// The chain RPC failed or timed out.
    RpcError,
}

impl ErrorCode {
    /// Returns the persisted/serialized string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AmountOutOfBounds => "AMOUNT_OUT_OF_BOUNDS",
            Self::IntentExpired => "INTENT_EXPIRED",
            Self::ConflictTxBoundElsewhere => "CONFLICT_TX_BOUND_ELSEWHERE",
            Self::SenderMismatch => "SENDER_MISMATCH",
            Self::RecipientMismatch => "RECIPIENT_MISMATCH",
            Self::TokenTransferNotFound => "TOKEN_TRANSFER_NOT_FOUND",
            Self::AmountMismatch => "AMOUNT_MISMATCH",
            Self::TxReverted => "TX_REVERTED",
            Self::ReceiptNotFound => "RECEIPT_NOT_FOUND",
            Self::RpcError => "RPC_ERROR",
        }
    }

    /// Returns `true` for mismatches between the on-chain transfer and the
    /// attempt. These end an attempt in `REJECTED`; every other terminal
    /// verification failure ends it in `FAILED`.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SenderMismatch
                | Self::RecipientMismatch
                | Self::TokenTransferNotFound
                | Self::AmountMismatch
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a persisted error code string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "AMOUNT_OUT_OF_BOUNDS" => Self::AmountOutOfBounds,
            "INTENT_EXPIRED" => Self::IntentExpired,
            "CONFLICT_TX_BOUND_ELSEWHERE" => Self::ConflictTxBoundElsewhere,
            "SENDER_MISMATCH" => Self::SenderMismatch,
            "RECIPIENT_MISMATCH" => Self::RecipientMismatch,
            "TOKEN_TRANSFER_NOT_FOUND" => Self::TokenTransferNotFound,
            "AMOUNT_MISMATCH" => Self::AmountMismatch,
            "TX_REVERTED" => Self::TxReverted,
            "RECEIPT_NOT_FOUND" => Self::ReceiptNotFound,
            "RPC_ERROR" => Self::RpcError,
            other => return Err(UnknownErrorCode(other.to_string())),
        };
        Ok(code)
    }
}
