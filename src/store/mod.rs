//! Cart backing stores.
//!
//! Exactly one store is authoritative at a time: the local guest file for
//! unauthenticated sessions, the remote user record otherwise. Both are
//! accessed only by the reconciliation engine.

pub mod guest;
pub mod remote;

pub use guest::GuestCartStore;
pub use remote::{CartGateway, HttpCartGateway};
