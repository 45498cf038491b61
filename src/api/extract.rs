//! Request extractors.
//!
//! Authentication happens upstream. The gateway in front of this service
//! forwards the verified identity in two headers, which
//! [`AuthenticatedTenant`] turns into a [`Tenant`].

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::domain::hex::normalize_address;
use crate::domain::{Tenant, TenantId};
use crate::error::PaymentError;

/// Header carrying the opaque tenant id.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Header carrying the wallet the tenant authenticated with.
pub const WALLET_ADDRESS_HEADER: &str = "x-wallet-address";

/// The calling tenant, taken from the identity headers.
#[derive(Debug, Clone)]
pub struct AuthenticatedTenant(pub Tenant);

impl<S> FromRequestParts<S> for AuthenticatedTenant
where
    S: Send + Sync,
{
    type Rejection = PaymentError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        tenant_from_headers(&parts.headers).map(Self)
    }
}

/// Reads and validates the identity headers.
///
/// # Errors
///
/// Returns [`PaymentError::Unauthenticated`] if a header is missing, empty
/// or not valid ASCII, or if the wallet is not a 20-byte hex address.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<Tenant, PaymentError> {
    let tenant_id = header_str(headers, TENANT_ID_HEADER)?;
    let wallet = header_str(headers, WALLET_ADDRESS_HEADER)?;
    let wallet_address = normalize_address(wallet).ok_or_else(|| {
        PaymentError::Unauthenticated(format!("{WALLET_ADDRESS_HEADER} is not a wallet address"))
    })?;

    Ok(Tenant {
        id: TenantId::new(tenant_id),
        wallet_address,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, PaymentError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::Unauthenticated(format!("missing {name} header")))
}
