//! Engine-push notification channel.
//!
//! The UI subscribes once and receives an event for every committed state
//! change; this replaces polling for cart changes. Publishing never blocks
//! and never fails an operation: a bus with no subscribers just drops the
//! event with a debug log.

use crate::errors::CouponRejection;
use crate::models::LineItemKey;
use tokio::sync::broadcast;
use tracing::debug;

/// The cart mode the engine is operating in, named in events and reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMode {
    /// Unauthenticated session; the guest cart file is authoritative.
    Guest,
    /// Authenticated session; the remote record for this user is
    /// authoritative.
    User { user_id: String },
}

/// A committed state change, published after the in-memory state (and,
/// where applicable, the write-through) has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    ItemAdded { key: LineItemKey, quantity: u32 },
    QuantityChanged { key: LineItemKey, quantity: u32 },
    ItemRemoved { key: LineItemKey },
    CartCleared,
    CouponApplied { code: String },
    CouponRemoved { code: String },
    /// An applied coupon stopped being valid after a cart mutation and was
    /// detached automatically. `reason` is `None` when the cart emptied.
    CouponDetached {
        code: String,
        reason: Option<CouponRejection>,
    },
    /// Guest and remote carts were merged on login.
    CartMerged { user_id: String },
    ModeChanged { mode: CartMode },
    /// A remote write-through failed; local state stands and the cart is
    /// dirty until a later flush succeeds.
    SyncPending,
    /// A previously dirty cart reached the remote store.
    Synced,
}

/// Broadcast wrapper the engine publishes through.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CartEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, logging instead of failing when nobody listens.
    pub fn publish(&self, event: CartEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(?event, "no cart event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(CartEvent::CartCleared);
        bus.publish(CartEvent::SyncPending);

        assert_eq!(rx.recv().await.unwrap(), CartEvent::CartCleared);
        assert_eq!(rx.recv().await.unwrap(), CartEvent::SyncPending);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.publish(CartEvent::CartCleared);
    }
}
