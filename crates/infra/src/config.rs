//! Configuration loading and representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_cart::CartLimits;

pub const ORDER_PREFIX_VAR: &str = "STOREFRONT_ORDER_PREFIX";
pub const ORDER_SEQUENCE_START_VAR: &str = "STOREFRONT_ORDER_SEQUENCE_START";
pub const MAX_LINE_QUANTITY_VAR: &str = "STOREFRONT_MAX_LINE_QUANTITY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    /// Prefix of generated order numbers (`ORD` → `ORD-00000001`).
    pub order_prefix: String,
    /// First sequence value handed out by the order number generator.
    pub order_sequence_start: u64,
    /// Largest quantity a single cart line may hold.
    pub max_line_quantity: u32,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            order_prefix: "ORD".to_string(),
            order_sequence_start: 1,
            max_line_quantity: CartLimits::default().max_line_quantity,
        }
    }
}

impl StorefrontConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; missing keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match lookup(ORDER_PREFIX_VAR) {
            Some(prefix) => {
                let trimmed = prefix.trim();
                if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
                    return Err(ConfigError::Invalid {
                        key: ORDER_PREFIX_VAR,
                        value: prefix,
                        reason: "must be a non-empty word".to_string(),
                    });
                }
                config.order_prefix = trimmed.to_string();
            }
            None => tracing::debug!(key = ORDER_PREFIX_VAR, default = %config.order_prefix, "using default"),
        }

        match lookup(ORDER_SEQUENCE_START_VAR) {
            Some(raw) => config.order_sequence_start = parse(ORDER_SEQUENCE_START_VAR, raw)?,
            None => tracing::debug!(
                key = ORDER_SEQUENCE_START_VAR,
                default = config.order_sequence_start,
                "using default"
            ),
        }

        match lookup(MAX_LINE_QUANTITY_VAR) {
            Some(raw) => {
                let max: u32 = parse(MAX_LINE_QUANTITY_VAR, raw.clone())?;
                if max == 0 {
                    return Err(ConfigError::Invalid {
                        key: MAX_LINE_QUANTITY_VAR,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                config.max_line_quantity = max;
            }
            None => tracing::debug!(
                key = MAX_LINE_QUANTITY_VAR,
                default = config.max_line_quantity,
                "using default"
            ),
        }

        Ok(config)
    }

    pub fn cart_limits(&self) -> CartLimits {
        CartLimits {
            max_line_quantity: self.max_line_quantity,
        }
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}
