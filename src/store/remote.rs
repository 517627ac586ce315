//! Remote cart gateway.
//!
//! A thin, typed interface to the backend record store. Every call is a
//! full read or a full overwrite of the user's `cart` field; the PATCH
//! carries only that field so the rest of the account record is never
//! disturbed. There is no concurrency token: the last replace wins.
//!
//! Records are deserialized into the crate's schema at this boundary;
//! shape mismatches surface as [`GatewayError::Schema`] instead of being
//! trusted at every call site.

use crate::errors::GatewayError;
use crate::models::{Cart, Coupon, UserCartRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Backing-store seam for the engine.
///
/// Implemented over HTTP in production ([`HttpCartGateway`]) and by
/// in-memory fakes in tests.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Full read of the user's cart field plus their coupon history.
    async fn fetch_cart(&self, user_id: &str) -> Result<UserCartRecord, GatewayError>;

    /// Full overwrite of the user's cart field; other account fields are
    /// left untouched.
    async fn replace_cart(&self, user_id: &str, cart: &Cart) -> Result<(), GatewayError>;

    /// Looks a coupon up by its (already uppercased) code.
    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, GatewayError>;
}

/// [`CartGateway`] over the record store's JSON API.
#[derive(Debug, Clone)]
pub struct HttpCartGateway {
    client: Client,
    base_url: String,
}

impl HttpCartGateway {
    /// Builds a gateway with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Network)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self, user_id: &str) -> Result<UserCartRecord, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/users/{user_id}")))
            .send()
            .await
            .map_err(GatewayError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Remote { status });
        }

        let body = response.bytes().await.map_err(GatewayError::Network)?;
        let record: UserCartRecord = serde_json::from_slice(&body)
            .map_err(|err| GatewayError::Schema(format!("user record: {err}")))?;

        debug!(user_id, lines = record.cart.len(), "fetched remote cart");
        Ok(record)
    }

    #[instrument(skip(self, cart))]
    async fn replace_cart(&self, user_id: &str, cart: &Cart) -> Result<(), GatewayError> {
        let response = self
            .client
            .patch(self.url(&format!("/users/{user_id}")))
            .json(&json!({ "cart": cart.items() }))
            .send()
            .await
            .map_err(GatewayError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Remote { status });
        }

        debug!(user_id, lines = cart.line_count(), "replaced remote cart");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, GatewayError> {
        let response = self
            .client
            .get(self.url("/coupons"))
            .query(&[("code", code)])
            .send()
            .await
            .map_err(GatewayError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Remote { status });
        }

        let body = response.bytes().await.map_err(GatewayError::Network)?;
        // The record store answers with a 0-or-1 element array.
        let mut matches: Vec<Coupon> = serde_json::from_slice(&body)
            .map_err(|err| GatewayError::Schema(format!("coupon record: {err}")))?;

        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }
}
