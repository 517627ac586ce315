//! Cart, coupon, and order-summary data model.
//!
//! Wire shapes match the backend record store: cart line items are
//! camelCase (`productId`, `variantId`, ...), coupon records are snake_case
//! with nested `validity` / `usage_stats` objects. Records are validated at
//! the gateway boundary by deserializing into these structs; anything that
//! does not fit surfaces as a schema error instead of failing deep inside
//! the engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a line item within a cart: one product variant.
///
/// Two cart entries are the same line iff both identifiers match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemKey {
    pub product_id: String,
    pub variant_id: String,
}

impl LineItemKey {
    pub fn new(product_id: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
        }
    }
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_id, self.variant_id)
    }
}

/// One line of a cart.
///
/// Display fields (`name`, `variant_label`, `image`, `category`) and
/// `unit_price` are denormalized at add-time and never re-fetched.
/// `available_stock` is a stock snapshot used only as the local upper bound
/// for quantity edits; it may go stale and is never re-validated against
/// live inventory here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    pub variant_label: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub available_stock: u32,
}

impl CartLineItem {
    pub fn key(&self) -> LineItemKey {
        LineItemKey::new(self.product_id.clone(), self.variant_id.clone())
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An ordered, key-unique sequence of line items.
///
/// Insertion order is display-relevant and preserved across updates.
/// All mutating methods maintain the invariants: no two items share a
/// [`LineItemKey`], and every quantity stays in `[1, available_stock]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    pub fn new(items: Vec<CartLineItem>) -> Self {
        let mut cart = Cart::default();
        for item in items {
            cart.upsert(item);
        }
        cart
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Total units across all lines.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    pub fn get(&self, key: &LineItemKey) -> Option<&CartLineItem> {
        self.items.iter().find(|i| &i.key() == key)
    }

    /// Adds an item, merging into an existing line with the same key.
    ///
    /// On merge the quantity is capped at the existing line's stock
    /// snapshot; the existing line keeps its position and its denormalized
    /// display fields. New lines append, clamped to their own stock.
    pub fn upsert(&mut self, item: CartLineItem) {
        let key = item.key();
        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
            existing.quantity = existing
                .quantity
                .saturating_add(item.quantity)
                .min(existing.available_stock)
                .max(1);
        } else {
            let mut item = item;
            item.quantity = item.quantity.min(item.available_stock).max(1);
            self.items.push(item);
        }
    }

    /// Applies a signed quantity delta to the line with the given key.
    ///
    /// The result is clamped to the stock snapshot; a delta that would take
    /// the quantity to zero or below removes the line instead. Returns
    /// `Some(new_quantity)` (`Some(0)` when the line was removed), or `None`
    /// when no line has that key.
    pub fn adjust_quantity(&mut self, key: &LineItemKey, delta: i64) -> Option<u32> {
        let pos = self.items.iter().position(|i| &i.key() == key)?;
        let item = &mut self.items[pos];
        let next = i64::from(item.quantity) + delta;
        if next < 1 {
            self.items.remove(pos);
            return Some(0);
        }
        let capped = u64::try_from(next)
            .unwrap_or(u64::from(item.available_stock))
            .min(u64::from(item.available_stock)) as u32;
        item.quantity = capped.max(1);
        Some(item.quantity)
    }

    /// Removes the line with the given key; returns whether it existed.
    pub fn remove(&mut self, key: &LineItemKey) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.key() != key);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Merges guest lines into this (remote) cart.
    ///
    /// Same-key lines combine quantities capped at the remote line's stock
    /// snapshot; unmatched guest lines append in their original order, so
    /// remote ordering comes first and guest ordering follows.
    pub fn merge_guest(&mut self, guest: Cart) {
        for guest_item in guest.items {
            let key = guest_item.key();
            if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
                existing.quantity = existing
                    .quantity
                    .saturating_add(guest_item.quantity)
                    .min(existing.available_stock)
                    .max(1);
            } else {
                self.items.push(guest_item);
            }
        }
    }
}

/// How a coupon discounts the order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// Validity window of a coupon, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponValidity {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Redemption bookkeeping as the backend reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsageStats {
    pub remaining: i64,
}

/// A coupon record as fetched from the backend.
///
/// Read-only on this side: usage decrement is a server-side concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub max_discount_value: Option<Decimal>,
    pub min_order_value: Decimal,
    pub validity: CouponValidity,
    pub is_active: bool,
    pub usage_stats: CouponUsageStats,
}

/// A coupon attached to the current session's cart.
///
/// `discount` is the amount computed at apply-time against the subtotal of
/// that moment; order summaries recompute the live amount from the coupon
/// record so percentage discounts track subsequent cart edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
    pub applied_at: DateTime<Utc>,
}

impl AppliedCoupon {
    pub fn code(&self) -> &str {
        &self.coupon.code
    }
}

/// Derived order totals. Never stored; recomputed on every read.
///
/// Amounts are exact decimals with no internal rounding. Round only at the
/// presentation boundary via [`OrderSummary::rounded`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderSummary {
    pub const ZERO: OrderSummary = OrderSummary {
        subtotal: Decimal::ZERO,
        discount: Decimal::ZERO,
        delivery: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
    };

    /// Copy with every amount rounded to 2 decimal places for display.
    pub fn rounded(&self) -> OrderSummary {
        use rust_decimal::RoundingStrategy::MidpointAwayFromZero;
        let r = |d: Decimal| d.round_dp_with_strategy(2, MidpointAwayFromZero);
        OrderSummary {
            subtotal: r(self.subtotal),
            discount: r(self.discount),
            delivery: r(self.delivery),
            tax: r(self.tax),
            total: r(self.total),
        }
    }
}

/// The slice of a user record the engine reads on login.
///
/// The record store returns the full account document; only the cart and
/// the used-coupon history matter here, and writes patch the `cart` field
/// alone so the rest of the account is never disturbed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserCartRecord {
    #[serde(default)]
    pub cart: Vec<CartLineItem>,
    #[serde(default, rename = "usedCoupons")]
    pub used_coupons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(product: &str, variant: &str, qty: u32, stock: u32, price: Decimal) -> CartLineItem {
        CartLineItem {
            product_id: product.to_string(),
            variant_id: variant.to_string(),
            name: format!("Product {product}"),
            variant_label: format!("Variant {variant}"),
            image: String::new(),
            category: "test".to_string(),
            unit_price: price,
            quantity: qty,
            available_stock: stock,
        }
    }

    #[test]
    fn upsert_deduplicates_by_key() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 2, 10, dec!(10)));
        cart.upsert(item("p1", "v1", 3, 10, dec!(10)));
        cart.upsert(item("p1", "v2", 1, 10, dec!(12)));

        assert_eq!(cart.line_count(), 2);
        assert_eq!(
            cart.get(&LineItemKey::new("p1", "v1")).map(|i| i.quantity),
            Some(5)
        );
    }

    #[test]
    fn upsert_caps_at_stock_snapshot() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 4, 5, dec!(10)));
        cart.upsert(item("p1", "v1", 4, 5, dec!(10)));

        assert_eq!(
            cart.get(&LineItemKey::new("p1", "v1")).map(|i| i.quantity),
            Some(5)
        );
    }

    #[test]
    fn upsert_preserves_insertion_order_on_update() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 1, 10, dec!(10)));
        cart.upsert(item("p2", "v1", 1, 10, dec!(20)));
        cart.upsert(item("p1", "v1", 1, 10, dec!(10)));

        let ids: Vec<&str> = cart.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn adjust_quantity_clamps_to_stock() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 3, 5, dec!(10)));

        let key = LineItemKey::new("p1", "v1");
        assert_eq!(cart.adjust_quantity(&key, 100), Some(5));
        assert_eq!(cart.adjust_quantity(&key, -2), Some(3));
    }

    #[test]
    fn adjust_quantity_below_one_removes_line() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 2, 5, dec!(10)));

        let key = LineItemKey::new("p1", "v1");
        assert_eq!(cart.adjust_quantity(&key, -2), Some(0));
        assert!(cart.is_empty());
    }

    #[test]
    fn adjust_quantity_unknown_key_is_none() {
        let mut cart = Cart::default();
        assert_eq!(cart.adjust_quantity(&LineItemKey::new("p", "v"), 1), None);
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let mut cart = Cart::default();
        cart.upsert(item("p1", "v1", 2, 10, dec!(19.99)));
        cart.upsert(item("p2", "v1", 1, 10, dec!(5.50)));

        assert_eq!(cart.subtotal(), dec!(45.48));
        assert_eq!(cart.unit_count(), 3);
    }

    #[test]
    fn merge_combines_quantities_capped_at_stock() {
        let mut remote = Cart::new(vec![
            item("p1", "v1", 3, 4, dec!(10)),
            item("p2", "v2", 1, 9, dec!(20)),
        ]);
        let guest = Cart::new(vec![item("p1", "v1", 2, 4, dec!(10))]);

        remote.merge_guest(guest);

        assert_eq!(remote.line_count(), 2);
        // 3 + 2 capped at the remote stock snapshot of 4.
        assert_eq!(
            remote.get(&LineItemKey::new("p1", "v1")).map(|i| i.quantity),
            Some(4)
        );
        assert_eq!(
            remote.get(&LineItemKey::new("p2", "v2")).map(|i| i.quantity),
            Some(1)
        );
    }

    #[test]
    fn merge_appends_new_guest_items_after_remote() {
        let mut remote = Cart::new(vec![item("p2", "v2", 1, 9, dec!(20))]);
        let guest = Cart::new(vec![item("p3", "v1", 2, 9, dec!(5))]);

        remote.merge_guest(guest);

        let ids: Vec<&str> = remote.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3"]);
    }

    #[test]
    fn merge_into_empty_remote_keeps_guest_items() {
        let mut remote = Cart::default();
        remote.merge_guest(Cart::new(vec![item("p1", "v1", 1, 5, dec!(10))]));

        assert_eq!(remote.line_count(), 1);
        assert_eq!(
            remote.get(&LineItemKey::new("p1", "v1")).map(|i| i.quantity),
            Some(1)
        );
    }

    #[test]
    fn line_item_wire_shape_is_camel_case() {
        let value = serde_json::to_value(item("p1", "v1", 2, 5, dec!(12.50))).unwrap();
        assert!(value.get("productId").is_some());
        assert!(value.get("variantId").is_some());
        assert!(value.get("unitPrice").is_some());
        assert!(value.get("availableStock").is_some());
    }

    #[test]
    fn coupon_wire_shape_round_trips() {
        let json = serde_json::json!({
            "code": "SAVE20",
            "discount_type": "PERCENTAGE",
            "discount_value": "20",
            "max_discount_value": "150",
            "min_order_value": "500",
            "validity": {
                "start_date": "2024-01-01T00:00:00Z",
                "end_date": "2030-01-01T00:00:00Z"
            },
            "is_active": true,
            "usage_stats": { "remaining": 10 }
        });

        let coupon: Coupon = serde_json::from_value(json).unwrap();
        assert_eq!(coupon.discount_type, DiscountType::Percentage);
        assert_eq!(coupon.max_discount_value, Some(dec!(150)));
        assert_eq!(coupon.usage_stats.remaining, 10);
    }

    #[test]
    fn user_record_missing_cart_defaults_empty() {
        let record: UserCartRecord =
            serde_json::from_value(serde_json::json!({ "email": "a@b.c" })).unwrap();
        assert!(record.cart.is_empty());
        assert!(record.used_coupons.is_empty());
    }

    #[test]
    fn summary_rounds_only_at_presentation() {
        let summary = OrderSummary {
            subtotal: dec!(10.005),
            discount: Decimal::ZERO,
            delivery: Decimal::ZERO,
            tax: dec!(1.8009),
            total: dec!(11.8059),
        };
        let rounded = summary.rounded();
        assert_eq!(rounded.subtotal, dec!(10.01));
        assert_eq!(rounded.tax, dec!(1.80));
        assert_eq!(rounded.total, dec!(11.81));
        // The source value is untouched.
        assert_eq!(summary.subtotal, dec!(10.005));
    }
}
