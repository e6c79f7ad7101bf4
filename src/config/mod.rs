use std::env;
use std::time::Duration;

pub mod cors;

pub use cors::create_cors_layer;

/// Connection settings for one of the external gateway surfaces.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key: String,
    pub checksum_key: String,
}

impl GatewaySettings {
    fn from_env(prefix: &str, default_base: &str) -> Self {
        Self {
            base_url: env::var(format!("{}_BASE_URL", prefix))
                .unwrap_or_else(|_| default_base.to_string()),
            api_key: env::var(format!("{}_API_KEY", prefix)).unwrap_or_default(),
            checksum_key: env::var(format!("{}_CHECKSUM_KEY", prefix)).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub payment_gateway: GatewaySettings,
    pub payout_gateway: GatewaySettings,
    pub gateway_timeout: Duration,
    pub checkout_ttl: Duration,
    pub order_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/gigpass".to_string()),
            port: env_u64("PORT", 3001) as u16,
            store_backend: match env::var("STORE_BACKEND").as_deref() {
                Ok("memory") => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            },
            payment_gateway: GatewaySettings::from_env(
                "PAYMENT_GATEWAY",
                "https://api.payment.example.com",
            ),
            payout_gateway: GatewaySettings::from_env(
                "PAYOUT_GATEWAY",
                "https://api.payout.example.com",
            ),
            gateway_timeout: Duration::from_secs(env_u64("GATEWAY_TIMEOUT_SECS", 10)),
            checkout_ttl: Duration::from_secs(env_u64("CHECKOUT_TTL_SECS", 15 * 60)),
            order_ttl: Duration::from_secs(env_u64("ORDER_TTL_SECS", 15 * 60)),
            sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", 60)),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_u64_falls_back_on_missing_or_garbage() {
        assert_eq!(env_u64("GIGPASS_TEST_NO_SUCH_VAR", 42), 42);
    }
}
