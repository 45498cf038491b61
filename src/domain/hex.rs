//! Validation and normalization of hex-encoded chain values.
//!
//! Addresses and hashes are stored lowercase so that comparisons and the
//! `(chain_id, tx_hash)` uniqueness constraint are case-insensitive.

use alloy::primitives::{Address, B256};

/// Normalizes a 20-byte `0x`-prefixed address to lowercase.
///
/// Returns `None` if the input is not `0x` followed by 40 hex digits.
#[must_use]
pub fn normalize_address(input: &str) -> Option<String> {
    let address: Address = strip_prefix(input.trim())?.parse().ok()?;
    Some(format!("{address:#x}"))
}

/// Normalizes a 32-byte `0x`-prefixed transaction hash to lowercase.
///
/// Returns `None` if the input is not `0x` followed by 64 hex digits.
#[must_use]
pub fn normalize_tx_hash(input: &str) -> Option<String> {
    let hash: B256 = strip_prefix(input.trim())?.parse().ok()?;
    Some(format!("{hash:#x}"))
}

/// The digits after a mandatory `0x` prefix.
fn strip_prefix(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
}
