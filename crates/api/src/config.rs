//! Runtime configuration read from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use exactmatch_core::{Money, Rate};
use exactmatch_orders::PricingPolicy;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MEDIA_BASE_URL: &str = "http://localhost:8080/media";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Prefix for media paths (images, logos) in responses.
    pub media_base_url: String,
    pub pricing: PricingPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse("BIND_ADDR", &var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()))?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: match var("FREE_SHIPPING_THRESHOLD") {
                Some(v) => money("FREE_SHIPPING_THRESHOLD", &v)?,
                None => defaults.free_shipping_threshold,
            },
            flat_shipping_fee: match var("FLAT_SHIPPING_FEE") {
                Some(v) => money("FLAT_SHIPPING_FEE", &v)?,
                None => defaults.flat_shipping_fee,
            },
            tax_rate: match var("TAX_RATE") {
                Some(v) => Rate::new(parse("TAX_RATE", &v)?).map_err(|e| invalid("TAX_RATE", e))?,
                None => defaults.tax_rate,
            },
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            media_base_url: var("MEDIA_BASE_URL").unwrap_or_else(|| DEFAULT_MEDIA_BASE_URL.to_string()),
            pricing,
        })
    }

    /// In-memory store, default pricing, ephemeral port.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            pricing: PricingPolicy::default(),
        }
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| invalid(name, e))
}

fn money(name: &'static str, value: &str) -> Result<Money, ConfigError> {
    Money::new(parse::<Decimal>(name, value)?).map_err(|e| invalid(name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(c.database_url, None);
        assert_eq!(c.media_base_url, DEFAULT_MEDIA_BASE_URL);
        assert_eq!(c.pricing, PricingPolicy::default());
    }

    #[test]
    fn pricing_overrides() {
        let c = config(&[
            ("FREE_SHIPPING_THRESHOLD", "250"),
            ("FLAT_SHIPPING_FEE", "9.99"),
            ("TAX_RATE", "0.2"),
            ("DATABASE_URL", "postgres://localhost/store"),
        ])
        .unwrap();
        assert_eq!(c.pricing.free_shipping_threshold, Money::from_units(250));
        assert_eq!(c.pricing.flat_shipping_fee.to_string(), "9.99");
        assert_eq!(c.pricing.tax_rate.value().to_string(), "0.2");
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/store"));
    }

    #[test]
    fn bad_values_are_startup_errors() {
        assert!(matches!(
            config(&[("TAX_RATE", "1.5")]),
            Err(ConfigError::Invalid { name: "TAX_RATE", .. })
        ));
        assert!(matches!(
            config(&[("FLAT_SHIPPING_FEE", "-1")]),
            Err(ConfigError::Invalid { name: "FLAT_SHIPPING_FEE", .. })
        ));
        assert!(matches!(
            config(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(c.database_url, None);
    }
}
