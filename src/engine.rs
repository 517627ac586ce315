//! Cart reconciliation engine.
//!
//! The one stateful component: it owns the canonical in-memory cart,
//! decides which backing store is authoritative for the current auth mode,
//! merges guest and remote carts on login, and serializes every mutation so
//! overlapping UI actions apply strictly in submission order.
//!
//! Mutations are write-through: in-memory state changes first (the UI sees
//! the result immediately), then the authoritative store is updated. A
//! failed remote write leaves the operation applied locally and flags the
//! cart dirty; the next mutation or an explicit [`CartEngine::sync`] flushes
//! the full current state, which is sufficient because replaces carry the
//! whole cart.

use crate::config::CartConfig;
use crate::coupon;
use crate::errors::{CartError, GatewayError};
use crate::events::{CartEvent, CartMode, EventBus};
use crate::models::{AppliedCoupon, Cart, CartLineItem, LineItemKey, OrderSummary};
use crate::pricing::{self, PricingRules};
use crate::store::{CartGateway, GuestCartStore, HttpCartGateway};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};

/// Everything the engine needs to know to add a line.
///
/// Display strings, price, and stock are denormalized here at add-time and
/// never re-fetched afterwards.
#[derive(Debug, Clone)]
pub struct AddItemInput {
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    pub variant_label: String,
    pub image: String,
    pub category: String,
    pub unit_price: Decimal,
    pub available_stock: u32,
    pub quantity: u32,
}

struct EngineState {
    mode: CartMode,
    cart: Cart,
    applied: Option<AppliedCoupon>,
    used_coupons: Vec<String>,
    dirty: bool,
    /// The guest file still holds pre-merge items because the post-merge
    /// replace failed; clear it once a flush succeeds.
    guest_clear_pending: bool,
}

/// The orchestrator. Construct one per session and hand it (by reference)
/// to the UI layer; the UI only dispatches intents and reads snapshots.
pub struct CartEngine {
    state: Mutex<EngineState>,
    gateway: Arc<dyn CartGateway>,
    guest_store: GuestCartStore,
    rules: PricingRules,
    events: EventBus,
}

impl CartEngine {
    /// Builds an engine over an explicit gateway and guest store.
    ///
    /// Starts in guest mode with whatever the guest file holds.
    pub fn new(
        gateway: Arc<dyn CartGateway>,
        guest_store: GuestCartStore,
        config: &CartConfig,
    ) -> Self {
        let cart = guest_store.load();
        info!(lines = cart.line_count(), "cart engine starting in guest mode");
        Self {
            state: Mutex::new(EngineState {
                mode: CartMode::Guest,
                cart,
                applied: None,
                used_coupons: Vec::new(),
                dirty: false,
                guest_clear_pending: false,
            }),
            gateway,
            guest_store,
            rules: config.pricing_rules(),
            events: EventBus::new(config.event_capacity),
        }
    }

    /// Convenience constructor wiring the HTTP gateway and guest store from
    /// configuration.
    pub fn from_config(config: &CartConfig) -> Result<Self, GatewayError> {
        let gateway =
            HttpCartGateway::new(config.api_base_url.as_str(), config.request_timeout())?;
        let guest_store = GuestCartStore::new(&config.storage_dir);
        Ok(Self::new(Arc::new(gateway), guest_store, config))
    }

    // ---- reads ------------------------------------------------------------

    /// Snapshot of the current cart.
    pub async fn cart(&self) -> Cart {
        self.state.lock().await.cart.clone()
    }

    /// Derived totals, rounded for display.
    pub async fn order_summary(&self) -> OrderSummary {
        let state = self.state.lock().await;
        pricing::compute(
            &state.cart,
            state.applied.as_ref().map(|a| &a.coupon),
            &self.rules,
        )
        .rounded()
    }

    pub async fn applied_coupon(&self) -> Option<AppliedCoupon> {
        self.state.lock().await.applied.clone()
    }

    pub async fn mode(&self) -> CartMode {
        self.state.lock().await.mode.clone()
    }

    /// Whether a remote write is still pending confirmation.
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Total units in the cart (badge count).
    pub async fn unit_count(&self) -> u32 {
        self.state.lock().await.cart.unit_count()
    }

    /// Committed-state-change notifications for the UI.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    // ---- mutations --------------------------------------------------------

    /// Adds an item, merging into an existing line with the same
    /// product/variant key and capping at the stock snapshot.
    #[instrument(skip(self, input), fields(product = %input.product_id, variant = %input.variant_id))]
    pub async fn add_item(&self, input: AddItemInput) -> Result<(), CartError> {
        if input.quantity == 0 {
            return Err(CartError::InvalidInput("quantity must be at least 1".into()));
        }
        if input.available_stock == 0 {
            return Err(CartError::InvalidInput("item is out of stock".into()));
        }

        let mut state = self.state.lock().await;
        let item = CartLineItem {
            product_id: input.product_id,
            variant_id: input.variant_id,
            name: input.name,
            variant_label: input.variant_label,
            image: input.image,
            category: input.category,
            unit_price: input.unit_price,
            quantity: input.quantity,
            available_stock: input.available_stock,
        };
        let key = item.key();
        state.cart.upsert(item);
        let quantity = state.cart.get(&key).map(|i| i.quantity).unwrap_or(0);

        self.write_through(&mut state).await;
        self.revalidate_coupon(&mut state);
        self.events.publish(CartEvent::ItemAdded { key, quantity });
        Ok(())
    }

    /// Applies a signed quantity delta; a result below 1 removes the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, key: &LineItemKey, delta: i64) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        let quantity = state
            .cart
            .adjust_quantity(key, delta)
            .ok_or_else(|| CartError::ItemNotFound(key.clone()))?;

        self.write_through(&mut state).await;
        self.revalidate_coupon(&mut state);
        if quantity == 0 {
            self.events.publish(CartEvent::ItemRemoved { key: key.clone() });
        } else {
            self.events.publish(CartEvent::QuantityChanged {
                key: key.clone(),
                quantity,
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, key: &LineItemKey) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if !state.cart.remove(key) {
            return Err(CartError::ItemNotFound(key.clone()));
        }

        self.write_through(&mut state).await;
        self.revalidate_coupon(&mut state);
        self.events.publish(CartEvent::ItemRemoved { key: key.clone() });
        Ok(())
    }

    /// Empties the cart and detaches any applied coupon.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.cart.clear();
        if let Some(applied) = state.applied.take() {
            self.events.publish(CartEvent::CouponDetached {
                code: applied.code().to_string(),
                reason: None,
            });
        }
        self.write_through(&mut state).await;
        self.events.publish(CartEvent::CartCleared);
        Ok(())
    }

    /// Fetches the coupon by code, validates it against the current
    /// subtotal, and attaches it with its apply-time discount. On failure
    /// the specific rejection is returned and nothing changes.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<AppliedCoupon, CartError> {
        let normalized = code.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(CartError::InvalidInput("coupon code is empty".into()));
        }

        let mut state = self.state.lock().await;
        if state.cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let coupon = self
            .gateway
            .fetch_coupon(&normalized)
            .await?
            .ok_or_else(|| CartError::CouponNotFound(normalized.clone()))?;

        let subtotal = state.cart.subtotal();
        coupon::validate(&coupon, subtotal, Utc::now(), &state.used_coupons)?;

        let applied = AppliedCoupon {
            discount: pricing::discount_for(&coupon, subtotal),
            coupon,
            applied_at: Utc::now(),
        };
        state.applied = Some(applied.clone());

        info!(code = %applied.code(), discount = %applied.discount, "coupon applied");
        self.events.publish(CartEvent::CouponApplied {
            code: applied.code().to_string(),
        });
        Ok(applied)
    }

    /// Detaches the applied coupon unconditionally; a no-op without one.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if let Some(applied) = state.applied.take() {
            self.events.publish(CartEvent::CouponRemoved {
                code: applied.code().to_string(),
            });
        }
        Ok(())
    }

    // ---- auth transitions -------------------------------------------------

    /// Guest → user transition: merges the guest cart into the remote cart,
    /// persists the result, clears the guest file, and makes the remote
    /// record authoritative. Readers observe either the pre-merge or the
    /// fully merged state, never an intermediate one.
    ///
    /// If the post-merge replace fails, the merged state stands locally
    /// with the cart dirty, and the guest file is kept until a later flush
    /// succeeds.
    #[instrument(skip(self))]
    pub async fn login(&self, user_id: &str) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if let CartMode::User { user_id: current } = &state.mode {
            return Err(CartError::InvalidOperation(format!(
                "already logged in as {current}"
            )));
        }

        // State is untouched until the remote cart has been fetched, so a
        // failed login leaves the guest session as it was.
        let record = self.gateway.fetch_cart(user_id).await?;

        let mut merged = Cart::new(record.cart);
        let guest = std::mem::take(&mut state.cart);
        let guest_lines = guest.line_count();
        merged.merge_guest(guest);

        state.mode = CartMode::User {
            user_id: user_id.to_string(),
        };
        state.cart = merged;
        state.used_coupons = record.used_coupons;

        match self.gateway.replace_cart(user_id, &state.cart).await {
            Ok(()) => {
                if let Err(err) = self.guest_store.clear() {
                    warn!(%err, "failed to clear guest cart after merge");
                }
                state.dirty = false;
                state.guest_clear_pending = false;
            }
            Err(err) => {
                warn!(%err, "post-merge replace failed; cart marked dirty");
                state.dirty = true;
                state.guest_clear_pending = true;
                self.events.publish(CartEvent::SyncPending);
            }
        }

        self.revalidate_coupon(&mut state);

        info!(
            user_id,
            guest_lines,
            merged_lines = state.cart.line_count(),
            "guest cart merged into user cart"
        );
        self.events.publish(CartEvent::CartMerged {
            user_id: user_id.to_string(),
        });
        self.events.publish(CartEvent::ModeChanged {
            mode: state.mode.clone(),
        });
        Ok(())
    }

    /// User → guest transition. The remote cart is left as-is for the next
    /// login; the guest session starts empty.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if state.mode == CartMode::Guest {
            return Ok(());
        }

        if state.dirty {
            warn!("logging out with unsynced cart changes; remote keeps the last confirmed state");
        }

        state.mode = CartMode::Guest;
        state.cart = Cart::default();
        state.used_coupons = Vec::new();
        state.dirty = false;
        state.guest_clear_pending = false;
        if let Some(applied) = state.applied.take() {
            self.events.publish(CartEvent::CouponDetached {
                code: applied.code().to_string(),
                reason: None,
            });
        }
        // Merged items went into the remote record and are not restored;
        // make sure a stale guest file cannot resurface them.
        if let Err(err) = self.guest_store.clear() {
            warn!(%err, "failed to clear guest cart on logout");
        }

        self.events.publish(CartEvent::ModeChanged {
            mode: CartMode::Guest,
        });
        Ok(())
    }

    // ---- sync -------------------------------------------------------------

    /// Manual flush of a dirty cart to the remote store.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }
        let CartMode::User { user_id } = state.mode.clone() else {
            // Dirty only ever applies to the remote store.
            state.dirty = false;
            return Ok(());
        };

        self.gateway.replace_cart(&user_id, &state.cart).await?;
        self.finish_flush(&mut state);
        Ok(())
    }

    /// Persists the current cart to whichever store is authoritative.
    ///
    /// Local store failures are logged and swallowed (the in-memory state
    /// is the session's source of truth either way). Remote failures flag
    /// the cart dirty; the next successful write-through clears the flag,
    /// because every replace carries the full cart.
    async fn write_through(&self, state: &mut EngineState) {
        match state.mode.clone() {
            CartMode::Guest => {
                if let Err(err) = self.guest_store.save(&state.cart) {
                    warn!(%err, "guest cart save failed; in-memory state stands");
                }
            }
            CartMode::User { user_id } => {
                match self.gateway.replace_cart(&user_id, &state.cart).await {
                    Ok(()) => self.finish_flush(state),
                    Err(err) => {
                        warn!(%err, "remote write-through failed; cart marked dirty");
                        if !state.dirty {
                            state.dirty = true;
                            self.events.publish(CartEvent::SyncPending);
                        }
                    }
                }
            }
        }
    }

    fn finish_flush(&self, state: &mut EngineState) {
        if state.guest_clear_pending {
            if let Err(err) = self.guest_store.clear() {
                warn!(%err, "failed to clear guest cart after deferred merge flush");
            }
            state.guest_clear_pending = false;
        }
        if state.dirty {
            state.dirty = false;
            self.events.publish(CartEvent::Synced);
        }
    }

    /// Re-checks the applied coupon after a cart mutation, detaching it
    /// when the cart emptied or it no longer validates.
    fn revalidate_coupon(&self, state: &mut EngineState) {
        let Some(applied) = state.applied.as_ref() else {
            return;
        };

        let reason = if state.cart.is_empty() {
            None
        } else {
            match coupon::validate(
                &applied.coupon,
                state.cart.subtotal(),
                Utc::now(),
                &state.used_coupons,
            ) {
                Ok(()) => return,
                Err(reason) => Some(reason),
            }
        };

        let code = applied.code().to_string();
        info!(%code, ?reason, "applied coupon no longer valid; detaching");
        state.applied = None;
        self.events.publish(CartEvent::CouponDetached { code, reason });
    }
}
