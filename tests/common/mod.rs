//! Shared harness for integration tests: the full payment stack over the
//! memory store, the real EVM verifier fed by an in-process chain, and a
//! test clock.

#![allow(dead_code, clippy::panic)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, B256, Log, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use stablepay_gateway::chain::{
    ChainReceipt, ChainRpc, ChainTransaction, EvmVerifier, OnChainVerifier, RpcError,
};
use stablepay_gateway::config::PaymentConfig;
use stablepay_gateway::domain::{Clock, Tenant, TenantId};
use stablepay_gateway::persistence::{AttemptStore, MemoryAttemptStore};
use stablepay_gateway::service::PaymentService;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Confirmations the verifier requires.
pub const MIN_CONFIRMATIONS: u64 = 3;

pub fn addr(fill: char) -> String {
    format!("0x{}", fill.to_string().repeat(40))
}

pub fn tx_hash(fill: char) -> String {
    format!("0x{}", fill.to_string().repeat(64))
}

pub fn token() -> String {
    addr('c')
}

pub fn treasury() -> String {
    addr('b')
}

pub fn config() -> PaymentConfig {
    PaymentConfig {
        chain_id: 8453,
        token_address: token(),
        recipient_address: treasury(),
        min_cents: 100,
        max_cents: 100_000,
        amount_scale: 10_000,
        credits_per_cent: 1,
        intent_ttl: Duration::minutes(30),
        pending_ttl: Duration::hours(24),
        verify_throttle: Duration::seconds(10),
        max_verify_attempts: 500,
        submit_verify_timeout: std::time::Duration::from_secs(2),
    }
}

pub fn tenant(id: &str, wallet: char) -> Tenant {
    Tenant {
        id: TenantId::new(id),
        wallet_address: addr(wallet),
    }
}

fn parse<T: std::str::FromStr>(value: &str) -> T {
    let Ok(parsed) = value.parse() else {
        panic!("malformed chain value {value}");
    };
    parsed
}

#[derive(Debug, Clone)]
struct Mined {
    tx: ChainTransaction,
    receipt: ChainReceipt,
}

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    mined: HashMap<B256, Mined>,
    outage: bool,
}

/// In-process chain answering the three reads the verifier makes.
#[derive(Debug, Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.with_state(|s| s.head = head);
        chain
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let Ok(mut state) = self.state.lock() else {
            panic!("chain state poisoned");
        };
        f(&mut state)
    }

    /// Mines an ERC-20 transfer of `amount` from `from` to `to` in the
    /// current head block.
    pub fn mine_transfer(&self, hash: &str, token: &str, from: &str, to: &str, amount: u64) {
        let event = Transfer {
            from: parse(from),
            to: parse(to),
            value: U256::from(amount),
        };
        let log = Log {
            address: parse(token),
            data: event.encode_log_data(),
        };
        self.mine(hash, from, true, vec![log]);
    }

    /// Mines a reverted transaction.
    pub fn mine_reverted(&self, hash: &str, from: &str) {
        self.mine(hash, from, false, Vec::new());
    }

    fn mine(&self, hash: &str, from: &str, succeeded: bool, logs: Vec<Log>) {
        let from: Address = parse(from);
        self.with_state(|s| {
            let mined = Mined {
                tx: ChainTransaction {
                    from,
                    block_number: Some(s.head),
                },
                receipt: ChainReceipt {
                    block_number: Some(s.head),
                    succeeded,
                    logs,
                },
            };
            s.mined.insert(parse(hash), mined);
        });
    }

    /// Adds `blocks` blocks on top of the head.
    pub fn advance(&self, blocks: u64) {
        self.with_state(|s| s.head += blocks);
    }

    /// While set, every call fails with a transport error.
    pub fn set_outage(&self, outage: bool) {
        self.with_state(|s| s.outage = outage);
    }

    fn check_outage(&self) -> Result<(), RpcError> {
        if self.with_state(|s| s.outage) {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError> {
        self.check_outage()?;
        Ok(self.with_state(|s| s.mined.get(&hash).map(|m| m.tx.clone())))
    }

    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ChainReceipt>, RpcError> {
        self.check_outage()?;
        Ok(self.with_state(|s| s.mined.get(&hash).map(|m| m.receipt.clone())))
    }

    async fn get_block_number(&self) -> Result<u64, RpcError> {
        self.check_outage()?;
        Ok(self.with_state(|s| s.head))
    }
}

/// Clock that only moves when a test advances it.
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Full stack wired over the memory store.
pub struct Harness {
    pub service: Arc<PaymentService>,
    pub store: Arc<MemoryAttemptStore>,
    pub chain: Arc<FakeChain>,
    pub clock: Arc<TestClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: PaymentConfig) -> Self {
        let store = Arc::new(MemoryAttemptStore::new());
        let chain = Arc::new(FakeChain::new(1_000));
        let clock = Arc::new(TestClock::new(Utc::now()));
        let verifier: Arc<dyn OnChainVerifier> = Arc::new(EvmVerifier::new(
            Arc::clone(&chain) as Arc<dyn ChainRpc>,
            MIN_CONFIRMATIONS,
        ));
        let service = Arc::new(PaymentService::new(
            Arc::clone(&store) as Arc<dyn AttemptStore>,
            verifier,
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        ));
        Self {
            service,
            store,
            chain,
            clock,
        }
    }

    /// Mines a transfer paying `tenant`'s intent of 500 cents in full.
    pub fn pay(&self, hash: &str, tenant: &Tenant) {
        self.chain
            .mine_transfer(hash, &token(), &tenant.wallet_address, &treasury(), 5_000_000);
    }

    /// Moves time past the throttle window.
    pub fn wait_throttle(&self) {
        self.clock.advance(Duration::seconds(11));
    }
}
