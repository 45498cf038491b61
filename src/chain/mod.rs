//! On-chain verification port.
//!
//! [`OnChainVerifier`] answers one question: does this transaction hash
//! prove the expected transfer, with enough confirmations? Implementations
//! are per chain family and selected once at startup by
//! [`build_verifier`]; nothing inspects requests to pick one.
//!
//! Verification never fails hard. Anything the chain cannot answer yet
//! (unknown hash, too few confirmations, RPC trouble) is
//! [`VerificationOutcome::Pending`].

pub mod evm;
pub mod rpc;

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::VerifierConfig;
use crate::domain::ErrorCode;

pub use evm::EvmVerifier;
pub use rpc::{ChainReceipt, ChainRpc, ChainTransaction, JsonRpcClient, RpcError};

/// Supported chain families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Ethereum JSON-RPC compatible chains with ERC-20 tokens.
    Evm,
}

impl FromStr for ChainFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evm" => Ok(Self::Evm),
            other => Err(format!("unsupported chain family: {other}")),
        }
    }
}

/// What the verifier must find on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Chain the transaction lives on.
    pub chain_id: u64,
    /// Transaction hash.
    pub tx_hash: B256,
    /// Expected transfer recipient.
    pub expected_to: Address,
    /// Expected token contract.
    pub expected_token: Address,
    /// Minimum transferred amount in smallest units.
    pub expected_amount: U256,
    /// Expected transfer sender (the tenant's wallet).
    pub expected_from: Address,
}

/// Transfer facts decoded from a verified transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedTransfer {
    /// Decoded sender.
    pub actual_from: Address,
    /// Decoded recipient.
    pub actual_to: Address,
    /// Decoded amount in smallest units.
    pub actual_amount: U256,
    /// Block containing the transaction.
    pub block_number: u64,
    /// Confirmations at verification time.
    pub confirmations: u64,
}

/// Why a verification could not conclude yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PendingReason {
    /// Transaction or receipt not visible to the node yet.
    NotFound,
    /// Fields match but the block is not deep enough.
    InsufficientConfirmations {
        /// Confirmations observed.
        confirmations: u64,
        /// Confirmations required.
        required: u64,
    },
    /// The RPC failed or timed out.
    RpcError {
        /// Diagnostic detail (logged and stored in event metadata only).
        detail: String,
    },
}

impl PendingReason {
    /// The error code to record for this pending reason, if any.
    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::RpcError { .. } => Some(ErrorCode::RpcError),
            _ => None,
        }
    }
}

/// Result of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The transfer matches and is final enough.
    Verified(VerifiedTransfer),
    /// Not decidable yet; try again later.
    Pending(PendingReason),
    /// The transaction can never satisfy this attempt.
    Failed {
        /// Reason.
        error_code: ErrorCode,
    },
}

/// Chain-family specific transaction verifier. Stateless per call.
#[async_trait]
pub trait OnChainVerifier: Send + Sync + Debug {
    /// Checks `request` against the chain.
    async fn verify(&self, request: &VerifyRequest) -> VerificationOutcome;
}

/// Builds the verifier for the configured chain family.
///
/// # Errors
///
/// Returns [`RpcError::Transport`] if the RPC client cannot be constructed.
pub fn build_verifier(config: &VerifierConfig) -> Result<Arc<dyn OnChainVerifier>, RpcError> {
    match config.chain_family {
        ChainFamily::Evm => {
            let client = JsonRpcClient::new(
                &config.rpc_url,
                config.rpc_timeout,
                config.max_rpc_retries,
            )?;
            Ok(Arc::new(EvmVerifier::new(
                Arc::new(client),
                config.min_confirmations,
            )))
        }
    }
}
