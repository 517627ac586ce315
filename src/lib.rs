//! Cartwheel — cart state and pricing reconciliation for a storefront
//! client.
//!
//! The crate keeps a single consistent cart across two backing stores: a
//! local file for guest sessions and a remote user record for authenticated
//! ones, with a merge on login. Order totals (subtotal, discount, delivery,
//! tax) are derived, never stored, and coupons are re-validated after every
//! cart mutation so a stale discount can never linger.
//!
//! The [`engine::CartEngine`] is the only stateful piece; pricing and
//! coupon validation are pure functions, and the stores are thin,
//! swappable seams.
//!
//! ```no_run
//! use cartwheel::{config::CartConfig, engine::CartEngine};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CartConfig::load()?;
//! let engine = CartEngine::from_config(&config)?;
//! let events = engine.subscribe();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod coupon;
pub mod engine;
pub mod errors;
pub mod events;
pub mod models;
pub mod pricing;
pub mod store;

pub use config::CartConfig;
pub use engine::{AddItemInput, CartEngine};
pub use errors::{CartError, CouponRejection, GatewayError, StorageError};
pub use events::{CartEvent, CartMode};
pub use models::{
    AppliedCoupon, Cart, CartLineItem, Coupon, DiscountType, LineItemKey, OrderSummary,
};
pub use pricing::PricingRules;
pub use store::{CartGateway, GuestCartStore, HttpCartGateway};
