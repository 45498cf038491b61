//! Chain reads needed by the EVM verifier, served by an `alloy` provider.
//!
//! Only three reads are used: transaction by hash, receipt by hash and the
//! latest block number. A missing transaction or receipt is a normal answer
//! (`Ok(None)`), not an error.

use std::fmt::Debug;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, Log};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{Transaction, TransactionReceipt};
use alloy::transports::http::{Http, reqwest};
use alloy::transports::{
    RpcError as TransportRpcError, TransportError, TransportErrorKind, TransportResult,
};
use async_trait::async_trait;

/// Pause between retries, multiplied by the retry number.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Chain RPC failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Connection, TLS or HTTP failure.
    #[error("rpc transport error: {0}")]
    Transport(String),
    /// The request exceeded the configured timeout.
    #[error("rpc request timed out")]
    Timeout,
    /// The node answered with a JSON-RPC error object.
    #[error("rpc code={code} message={message}")]
    Node {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The node answered with something that does not decode.
    #[error("malformed rpc payload: {0}")]
    Decode(String),
}

/// The parts of a transaction the verifier looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    /// Signer.
    pub from: Address,
    /// Containing block; `None` while in the mempool.
    pub block_number: Option<u64>,
}

impl From<&Transaction> for ChainTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            from: TransactionResponse::from(tx),
            block_number: TransactionResponse::block_number(tx),
        }
    }
}

/// The parts of a receipt the verifier looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    /// Containing block.
    pub block_number: Option<u64>,
    /// `false` when the transaction reverted.
    pub succeeded: bool,
    /// Emitted logs, in order.
    pub logs: Vec<Log>,
}

impl From<&TransactionReceipt> for ChainReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            block_number: receipt.block_number,
            succeeded: receipt.status(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }
    }
}

/// Read-only chain access used by the EVM verifier.
#[async_trait]
pub trait ChainRpc: Send + Sync + Debug {
    /// Fetches a transaction by hash.
    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError>;

    /// Fetches a transaction receipt by hash.
    async fn get_transaction_receipt(&self, hash: B256)
    -> Result<Option<ChainReceipt>, RpcError>;

    /// Returns the latest block number.
    async fn get_block_number(&self) -> Result<u64, RpcError>;
}

/// Longest a single [`JsonRpcClient`] call can take: every try runs into
/// `timeout` and every retry waits its backoff first.
#[must_use]
pub fn call_budget(timeout: Duration, max_retries: u32) -> Duration {
    let tries = max_retries.saturating_add(1);
    let backoff_steps = (1..=max_retries).fold(0u32, u32::saturating_add);
    timeout
        .saturating_mul(tries)
        .saturating_add(RETRY_BACKOFF.saturating_mul(backoff_steps))
}

/// HTTP JSON-RPC client over an `alloy` [`RootProvider`], with a per-request
/// timeout on the transport and a bounded number of retries, both fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    provider: RootProvider,
    max_retries: u32,
}

impl JsonRpcClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the URL does not parse or the HTTP
    /// client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration, max_retries: u32) -> Result<Self, RpcError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| RpcError::Transport(format!("invalid rpc url {endpoint}: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let client = RpcClient::new(Http::with_client(http_client, url), false);
        Ok(Self {
            provider: RootProvider::new(client),
            max_retries,
        })
    }

    /// Runs `call`, retrying transport failures and timeouts up to
    /// `max_retries` times. Node error objects are not retried.
    async fn with_retries<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T, RpcError>
    where
        F: Fn() -> Fut,
        Fut: IntoFuture<Output = TransportResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await.map_err(map_transport_error) {
                Err(err @ (RpcError::Transport(_) | RpcError::Timeout))
                    if attempt < self.max_retries =>
                {
                    attempt += 1;
                    tracing::debug!(method, attempt, error = %err, "retrying rpc call");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }
}

fn map_transport_error(err: TransportError) -> RpcError {
    match err {
        TransportRpcError::ErrorResp(payload) => RpcError::Node {
            code: payload.code,
            message: payload.message.to_string(),
        },
        TransportRpcError::Transport(kind) if is_timeout(&kind) => RpcError::Timeout,
        TransportRpcError::Transport(kind) => RpcError::Transport(kind.to_string()),
        other => RpcError::Decode(other.to_string()),
    }
}

fn is_timeout(kind: &TransportErrorKind) -> bool {
    match kind {
        TransportErrorKind::Custom(inner) => inner
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_timeout),
        _ => false,
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError> {
        let tx = self
            .with_retries("eth_getTransactionByHash", || {
                self.provider.get_transaction_by_hash(hash)
            })
            .await?;
        Ok(tx.as_ref().map(ChainTransaction::from))
    }

    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ChainReceipt>, RpcError> {
        let receipt = self
            .with_retries("eth_getTransactionReceipt", || {
                self.provider.get_transaction_receipt(hash)
            })
            .await?;
        Ok(receipt.as_ref().map(ChainReceipt::from))
    }

    async fn get_block_number(&self) -> Result<u64, RpcError> {
        self.with_retries("eth_blockNumber", || self.provider.get_block_number())
            .await
    }
}
