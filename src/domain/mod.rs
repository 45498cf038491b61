//! Domain layer: payment attempts, the state machine, audit events and
//! ledger rows.
//!
//! Nothing in here performs I/O. Services load an attempt, apply one of the
//! [`PaymentAttempt`] mutators, and hand the result to the store.

pub mod attempt;
pub mod attempt_id;
pub mod clock;
pub mod error_code;
pub mod hex;
pub mod ledger;
pub mod payment_event;
pub mod tenant;

pub use attempt::{AttemptStatus, PaymentAttempt, TransitionError};
pub use attempt_id::AttemptId;
pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub(crate) use clock::ManualClock;
pub use error_code::ErrorCode;
pub use ledger::{LedgerCredit, LedgerEntry, SettlementOutcome};
pub use payment_event::{PaymentEvent, PaymentEventType};
pub use tenant::{Tenant, TenantId};
