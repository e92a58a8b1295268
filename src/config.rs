//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};

/// Main configuration for the admission layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Key-value store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Short-window rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Monthly quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

/// Key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Service prefix prepended to every key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1/".to_string()
}

fn default_key_prefix() -> String {
    "tollgate".to_string()
}

/// Short-window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    /// Window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests_per_window(),
            window_minutes: default_window_minutes(),
        }
    }
}

fn default_max_requests_per_window() -> u32 {
    100
}

fn default_window_minutes() -> u64 {
    60
}

/// Monthly quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Monthly call allowance for the free tier
    #[serde(default = "default_free_calls_per_month")]
    pub free_calls_per_month: u64,

    /// Multiplier applied to the free allowance for the premium tier
    #[serde(default = "default_premium_multiplier")]
    pub premium_multiplier: u64,

    /// Price per call in USD. Not consulted by admission decisions;
    /// carried for billing and response context.
    #[serde(default = "default_price_per_call")]
    pub price_per_call: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_calls_per_month: default_free_calls_per_month(),
            premium_multiplier: default_premium_multiplier(),
            price_per_call: default_price_per_call(),
        }
    }
}

impl QuotaConfig {
    /// Billing estimate for a number of calls, at the configured price.
    pub fn estimated_cost(&self, calls: u64) -> f64 {
        calls as f64 * self.price_per_call
    }
}

fn default_free_calls_per_month() -> u64 {
    1000
}

fn default_premium_multiplier() -> u64 {
    10
}

fn default_price_per_call() -> f64 {
    0.01
}

impl TollgateConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::error::TollgateError::Config(e.to_string()))
    }
}
