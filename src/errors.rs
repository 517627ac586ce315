//! Error taxonomy for the cart engine.
//!
//! No error here is fatal: storage failures fall back to an empty guest
//! cart, gateway failures leave the optimistic local state standing with the
//! cart flagged dirty, and coupon rejections are user-facing validation
//! messages that never mutate cart state.

use crate::models::LineItemKey;
use rust_decimal::Decimal;
use thiserror::Error;

/// Local persistent storage failure (guest cart file).
///
/// Recovered locally: reads fall back to an empty cart, writes are logged
/// and dropped. Never surfaced as a blocking error to the user.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cart record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Remote cart gateway failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure or timeout; the request may or may not have
    /// reached the record store.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The record store answered with a non-success status.
    #[error("remote error: status {status}")]
    Remote { status: http::StatusCode },

    /// The record store answered 2xx but the body did not match the
    /// expected record shape.
    #[error("schema error: {0}")]
    Schema(String),
}

/// Why a coupon cannot be applied (or can no longer stay applied).
///
/// Surfaced verbatim to the UI as a validation message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouponRejection {
    #[error("this coupon is not active")]
    Inactive,

    #[error("this coupon is not yet valid")]
    NotYetValid,

    #[error("this coupon has expired")]
    Expired,

    /// Carries the amount still missing so the UI can render
    /// "add X more to apply this coupon".
    #[error("order subtotal is {shortfall} below the coupon minimum")]
    BelowMinimumOrder { shortfall: Decimal },

    #[error("this coupon has been fully redeemed")]
    Exhausted,

    #[error("this coupon was already used on this account")]
    AlreadyUsed,
}

/// Top-level error type returned by engine operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("invalid coupon code: {0}")]
    CouponNotFound(String),

    #[error(transparent)]
    CouponRejected(#[from] CouponRejection),

    #[error("no cart line for {0}")]
    ItemNotFound(LineItemKey),

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
