//! Type-safe payment attempt identifier.
//!
//! [`AttemptId`] is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! attempt identifiers cannot be confused with tenant ids or ledger row ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a payment attempt.
///
/// Generated once by the intent service and immutable thereafter. Exposed
/// to clients as the handle for submit and status calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(uuid::Uuid);

impl AttemptId {
    /// Creates a new random `AttemptId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates an `AttemptId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for AttemptId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AttemptId> for uuid::Uuid {
    fn from(id: AttemptId) -> Self {
        id.0
    }
}
