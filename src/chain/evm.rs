//! EVM verifier: checks an ERC-20 `Transfer` inside a mined transaction.
//!
//! Order of checks:
//! 1. transaction and receipt must both exist (else pending);
//! 2. the receipt must not be reverted;
//! 3. a `Transfer` log from the expected token must exist;
//! 4. sender, recipient and amount must match (amount may exceed);
//! 5. the block must have enough confirmations (else pending).
//!
//! RPC failures at any step are pending, never terminal.

use std::sync::Arc;

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;

use super::rpc::{ChainRpc, RpcError};
use super::{OnChainVerifier, PendingReason, VerificationOutcome, VerifiedTransfer, VerifyRequest};
use crate::domain::ErrorCode;

mod erc20 {
    alloy::sol! {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

use erc20::Transfer;

/// Chain reads one verification pass makes at most: transaction, receipt
/// and head block.
pub const RPC_CALLS_PER_PASS: u32 = 3;

/// Verifier for Ethereum JSON-RPC compatible chains.
#[derive(Debug, Clone)]
pub struct EvmVerifier {
    rpc: Arc<dyn ChainRpc>,
    min_confirmations: u64,
}

/// A decoded ERC-20 transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecodedTransfer {
    from: Address,
    to: Address,
    amount: U256,
}

impl EvmVerifier {
    /// Creates a verifier requiring `min_confirmations` (at least one).
    #[must_use]
    pub fn new(rpc: Arc<dyn ChainRpc>, min_confirmations: u64) -> Self {
        Self {
            rpc,
            min_confirmations: min_confirmations.max(1),
        }
    }
}

#[async_trait]
impl OnChainVerifier for EvmVerifier {
    async fn verify(&self, request: &VerifyRequest) -> VerificationOutcome {
        let hash = request.tx_hash;

        let tx = match self.rpc.get_transaction(hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return VerificationOutcome::Pending(PendingReason::NotFound),
            Err(err) => return rpc_pending(request, "eth_getTransactionByHash", &err),
        };
        let receipt = match self.rpc.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => return VerificationOutcome::Pending(PendingReason::NotFound),
            Err(err) => return rpc_pending(request, "eth_getTransactionReceipt", &err),
        };
        let Some(tx_block) = receipt.block_number else {
            return VerificationOutcome::Pending(PendingReason::NotFound);
        };
        tracing::debug!(tx_hash = %hash, signer = %tx.from, block = tx_block, "receipt found");

        if !receipt.succeeded {
            return VerificationOutcome::Failed {
                error_code: ErrorCode::TxReverted,
            };
        }

        let transfers: Vec<DecodedTransfer> = receipt
            .logs
            .iter()
            .filter_map(|log| decode_transfer(log, request.expected_token))
            .collect();
        // A transaction may move the token more than once; prefer the leg
        // paying the expected recipient.
        let Some(transfer) = transfers
            .iter()
            .find(|t| t.to == request.expected_to)
            .or_else(|| transfers.first())
        else {
            return VerificationOutcome::Failed {
                error_code: ErrorCode::TokenTransferNotFound,
            };
        };

        if transfer.from != request.expected_from {
            return VerificationOutcome::Failed {
                error_code: ErrorCode::SenderMismatch,
            };
        }
        if transfer.to != request.expected_to {
            return VerificationOutcome::Failed {
                error_code: ErrorCode::RecipientMismatch,
            };
        }
        if transfer.amount < request.expected_amount {
            return VerificationOutcome::Failed {
                error_code: ErrorCode::AmountMismatch,
            };
        }

        let current_block = match self.rpc.get_block_number().await {
            Ok(block) => block,
            Err(err) => return rpc_pending(request, "eth_blockNumber", &err),
        };
        let confirmations = current_block
            .checked_sub(tx_block)
            .map_or(0, |depth| depth.saturating_add(1));
        if confirmations < self.min_confirmations {
            return VerificationOutcome::Pending(PendingReason::InsufficientConfirmations {
                confirmations,
                required: self.min_confirmations,
            });
        }

        VerificationOutcome::Verified(VerifiedTransfer {
            actual_from: transfer.from,
            actual_to: transfer.to,
            actual_amount: transfer.amount,
            block_number: tx_block,
            confirmations,
        })
    }
}

fn rpc_pending(request: &VerifyRequest, method: &str, err: &RpcError) -> VerificationOutcome {
    tracing::warn!(tx_hash = %request.tx_hash, method, error = %err, "rpc call failed");
    VerificationOutcome::Pending(PendingReason::RpcError {
        detail: err.to_string(),
    })
}

/// Decodes `log` as an ERC-20 `Transfer` emitted by `token`. Logs with a
/// different signature or layout are skipped.
fn decode_transfer(log: &Log, token: Address) -> Option<DecodedTransfer> {
    if log.address != token || log.data.topics().first() != Some(&Transfer::SIGNATURE_HASH) {
        return None;
    }
    let event = Transfer::decode_log_data(&log.data).ok()?;
    Some(DecodedTransfer {
        from: event.from,
        to: event.to,
        amount: event.value,
    })
}
