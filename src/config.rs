//! Engine configuration.
//!
//! Defaults carry the storefront's monetary rules (flat 50 delivery fee
//! waived above a 500 subtotal, 18% tax) and a 10 second gateway timeout.
//! [`CartConfig::load`] layers an optional config file and `CARTWHEEL_*`
//! environment variables over those defaults.

use crate::pricing::PricingRules;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_API_BASE_URL: &str = "http://localhost:4000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EVENT_CAPACITY: usize = 64;
const CONFIG_FILE: &str = "config/cartwheel";
const ENV_PREFIX: &str = "CARTWHEEL";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartConfig {
    /// Base URL of the backend record store.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory holding the guest cart file.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Upper bound on any single gateway call; a timeout is a network
    /// error and leaves the local optimistic state standing.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Buffered capacity of the cart event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,

    #[serde(default = "default_free_delivery_threshold")]
    pub free_delivery_threshold: Decimal,

    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".cartwheel")
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_delivery_fee() -> Decimal {
    dec!(50)
}

fn default_free_delivery_threshold() -> Decimal {
    dec!(500)
}

fn default_tax_rate() -> Decimal {
    dec!(0.18)
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            storage_dir: default_storage_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            event_capacity: default_event_capacity(),
            delivery_fee: default_delivery_fee(),
            free_delivery_threshold: default_free_delivery_threshold(),
            tax_rate: default_tax_rate(),
        }
    }
}

impl CartConfig {
    /// Loads configuration from `config/cartwheel.*` (optional) and
    /// `CARTWHEEL_*` environment variables, over the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg: CartConfig = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        info!(
            api_base_url = %cfg.api_base_url,
            storage_dir = %cfg.storage_dir.display(),
            "loaded cart configuration"
        );
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pricing_rules(&self) -> PricingRules {
        PricingRules {
            delivery_fee: self.delivery_fee,
            free_delivery_threshold: self.free_delivery_threshold,
            tax_rate: self.tax_rate,
        }
    }
}
