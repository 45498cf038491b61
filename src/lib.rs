//! # stablepay-gateway
//!
//! Stablecoin payment intake with exactly-once settlement.
//!
//! A tenant creates a payment intent (a quote for an exact token transfer
//! to the treasury), pays on-chain, and submits the transaction hash. The
//! gateway verifies the transfer against the chain and credits the
//! tenant's ledger balance exactly once, no matter how many submits,
//! status reads or instances race on the same attempt.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, tenant headers from the auth proxy)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PaymentService (service/)
//!     │     ├── intents, submission, polling gate
//!     │     ├── VerificationRunner ──▶ OnChainVerifier (chain/)
//!     │     └── SettlementCoordinator
//!     │
//!     ├── PaymentAttempt state machine (domain/)
//!     │
//!     └── AttemptStore (persistence/): PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
