//! Pure order-total derivation.
//!
//! [`compute`] is idempotent and side-effect-free: the same cart and coupon
//! always produce byte-identical output. All arithmetic stays in exact
//! decimals; rounding happens only at the presentation boundary
//! ([`crate::models::OrderSummary::rounded`]).

use crate::models::{Cart, Coupon, DiscountType, OrderSummary};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Monetary rules for delivery and tax, taken from [`crate::config::CartConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRules {
    /// Flat delivery fee charged below the free-delivery threshold.
    pub delivery_fee: Decimal,
    /// Subtotals strictly above this ship free.
    pub free_delivery_threshold: Decimal,
    /// Tax rate applied to the discounted subtotal.
    pub tax_rate: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            delivery_fee: dec!(50),
            free_delivery_threshold: dec!(500),
            tax_rate: dec!(0.18),
        }
    }
}

/// Discount a coupon grants against a subtotal.
///
/// Percentage discounts are capped by `max_discount_value` when present;
/// fixed discounts never exceed the subtotal, so a large coupon cannot
/// drive the total negative.
pub fn discount_for(coupon: &Coupon, subtotal: Decimal) -> Decimal {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let pct = subtotal * coupon.discount_value / dec!(100);
            match coupon.max_discount_value {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };
    raw.min(subtotal).max(Decimal::ZERO)
}

/// Derives the order summary for a cart and an optionally applied coupon.
///
/// An empty cart always yields the all-zero summary regardless of rules.
pub fn compute(cart: &Cart, applied: Option<&Coupon>, rules: &PricingRules) -> OrderSummary {
    if cart.is_empty() {
        return OrderSummary::ZERO;
    }

    let subtotal = cart.subtotal();
    let discount = applied
        .map(|coupon| discount_for(coupon, subtotal))
        .unwrap_or(Decimal::ZERO);

    let delivery = if subtotal > rules.free_delivery_threshold {
        Decimal::ZERO
    } else {
        rules.delivery_fee
    };

    let tax = (subtotal - discount) * rules.tax_rate;
    let total = (subtotal - discount) + delivery + tax;

    OrderSummary {
        subtotal,
        discount,
        delivery,
        tax,
        total,
    }
}
