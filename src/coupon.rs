//! Pure coupon validation.
//!
//! Deterministic and free of I/O: the clock and the per-user usage history
//! are passed in. The engine runs this both at apply-time and after every
//! cart-mutating operation to decide whether an already-applied coupon must
//! be auto-detached.

use crate::errors::CouponRejection;
use crate::models::Coupon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Checks whether `coupon` is applicable to a cart with the given subtotal.
///
/// Checks run in a fixed order so the user always sees the most actionable
/// message first: active flag, validity window, minimum order value (with
/// the shortfall amount), global remaining uses, then the per-user history.
pub fn validate(
    coupon: &Coupon,
    subtotal: Decimal,
    now: DateTime<Utc>,
    used_codes: &[String],
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }

    if now < coupon.validity.start_date {
        return Err(CouponRejection::NotYetValid);
    }
    if now > coupon.validity.end_date {
        return Err(CouponRejection::Expired);
    }

    if subtotal < coupon.min_order_value {
        return Err(CouponRejection::BelowMinimumOrder {
            shortfall: coupon.min_order_value - subtotal,
        });
    }

    if coupon.usage_stats.remaining <= 0 {
        return Err(CouponRejection::Exhausted);
    }

    if used_codes.iter().any(|c| c.eq_ignore_ascii_case(&coupon.code)) {
        return Err(CouponRejection::AlreadyUsed);
    }

    Ok(())
}
