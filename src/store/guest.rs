//! Guest cart persistence.
//!
//! One JSON file under a fixed name holds the serialized guest cart.
//! Reads fail soft: a missing, unreadable, or corrupt file is an empty
//! cart, never an error the caller has to handle. Writes are full-replace,
//! last-writer-wins; merging is the engine's job, not this layer's.

use crate::errors::StorageError;
use crate::models::{Cart, CartLineItem};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const GUEST_CART_FILE: &str = "guest_cart.json";

#[derive(Debug, Clone)]
pub struct GuestCartStore {
    path: PathBuf,
}

impl GuestCartStore {
    /// Store backed by `<dir>/guest_cart.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(GUEST_CART_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the guest cart, falling back to an empty cart on any failure.
    pub fn load(&self) -> Cart {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Cart::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read guest cart; starting empty");
                return Cart::default();
            }
        };

        match serde_json::from_str::<Vec<CartLineItem>>(&raw) {
            // Re-building through Cart::new re-establishes the key and
            // quantity invariants even if the file was edited by hand.
            Ok(items) => Cart::new(items),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "corrupt guest cart; starting empty");
                Cart::default()
            }
        }
    }

    /// Replaces the stored cart with `cart`.
    pub fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(cart.items())?;
        fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), lines = cart.line_count(), "saved guest cart");
        Ok(())
    }

    /// Removes the stored cart; absence is not an error.
    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
