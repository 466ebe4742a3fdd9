//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use anyhow::Context;

use storefront_hex::outbound::{GatewayCurrency, ZarinpalConfig};
use storefront_types::ExchangeRateMatrix;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub gateway: ZarinpalConfig,
    pub lock_ttl: chrono::Duration,
    pub rate_limit_per_minute: u32,
    pub rates: ExchangeRateMatrix,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let merchant_id = lookup("ZARINPAL_MERCHANT_ID")
            .ok_or_else(|| anyhow::anyhow!("ZARINPAL_MERCHANT_ID environment variable is required"))?;
        let callback_url = lookup("PAYMENT_CALLBACK_URL").ok_or_else(|| {
            anyhow::anyhow!("PAYMENT_CALLBACK_URL environment variable is required")
        })?;
        let currency = match lookup("ZARINPAL_CURRENCY") {
            Some(raw) => raw
                .parse::<GatewayCurrency>()
                .map_err(|e| anyhow::anyhow!("ZARINPAL_CURRENCY: {}", e))?,
            None => GatewayCurrency::default(),
        };
        let gateway = ZarinpalConfig {
            merchant_id,
            sandbox: flag(&lookup, "ZARINPAL_SANDBOX"),
            currency,
            callback_url,
            timeout: Duration::from_secs(parse_or(&lookup, "GATEWAY_TIMEOUT_SECS", 10u64)?),
        };

        let lock_ttl = chrono::Duration::seconds(parse_or(&lookup, "PAYMENT_LOCK_TTL_SECS", 30i64)?);
        if lock_ttl <= chrono::Duration::zero() {
            anyhow::bail!("PAYMENT_LOCK_TTL_SECS must be positive");
        }

        Ok(Self {
            port,
            database_url,
            gateway,
            lock_ttl,
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100u32)?,
            rates: ExchangeRateMatrix::from_vars(&lookup),
        })
    }
}

/// Whether to export traces over OTLP.
///
/// Read on its own because tracing is set up before the rest of the
/// configuration is loaded, so that loading can log.
pub fn otel_enabled() -> bool {
    flag(&|key: &str| env::var(key).ok(), "OTEL_ENABLED")
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
