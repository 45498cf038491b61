//! Data Transfer Objects for REST request/response serialization.
//!
//! Token amounts are serialized as JSON strings to prevent precision loss
//! in clients that parse numbers as doubles.

pub mod payment_dto;

pub use payment_dto::*;
