//! Tenant identity supplied by the upstream authentication collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque tenant identifier. Never derived by this service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wraps an opaque tenant id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated caller: tenant id plus the wallet the tenant signed in
/// with. The wallet becomes the expected sender of every attempt the
/// tenant creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    /// Tenant identifier.
    pub id: TenantId,
    /// Normalized (lowercase) wallet address.
    pub wallet_address: String,
}
