use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use alphasphere_market_data::{cache::DEFAULT_JANITOR_INTERVAL, Category, CategoryTtls};
use anyhow::Context;

pub const DEFAULT_ALPACA_BASE_URL: &str = "https://data.alpaca.markets";
pub const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Credentials for the brokerage pass-through.
#[derive(Clone, Debug)]
pub struct AlpacaConfig {
    pub key_id: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: String,
}

/// Credentials for the chat-completion pass-through.
#[derive(Clone, Debug)]
pub struct DeepSeekConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub cache_file: PathBuf,
    pub cache_flush_every: u64,
    pub janitor_interval: Duration,
    pub rate_gate_interval: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub upstream_timeout: Duration,
    pub ttls: CategoryTtls,
    pub alpaca: AlpacaConfig,
    pub deepseek: DeepSeekConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("SPHERE_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5001".to_string())
            .parse()
            .context("Invalid SPHERE_LISTEN_ADDR")?;
        let cors_allow = std::env::var("SPHERE_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let cache_file = std::env::var("SPHERE_CACHE_FILE")
            .unwrap_or_else(|_| "./data/cache.json".into())
            .into();

        let mut ttls = CategoryTtls::default();
        for category in Category::ALL {
            let var = format!("SPHERE_TTL_{}_SECS", category.as_str().to_uppercase());
            let secs = env_or(&var, ttls.get(category).as_secs());
            ttls.set(category, Duration::from_secs(secs));
        }

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(env_or("SPHERE_REQUEST_TIMEOUT_MS", 30_000)),
            cache_file,
            cache_flush_every: env_or("SPHERE_CACHE_FLUSH_EVERY", 10),
            janitor_interval: Duration::from_secs(env_or(
                "SPHERE_JANITOR_INTERVAL_SECS",
                DEFAULT_JANITOR_INTERVAL.as_secs(),
            )),
            rate_gate_interval: Duration::from_millis(env_or("SPHERE_RATE_GATE_MS", 100)),
            retry_attempts: env_or("SPHERE_RETRY_ATTEMPTS", 3),
            retry_base_delay: Duration::from_millis(env_or("SPHERE_RETRY_BASE_MS", 1_000)),
            upstream_timeout: Duration::from_millis(env_or("SPHERE_UPSTREAM_TIMEOUT_MS", 10_000)),
            ttls,
            alpaca: AlpacaConfig {
                key_id: non_empty_var("ALPACA_API_KEY_ID"),
                secret_key: non_empty_var("ALPACA_API_SECRET_KEY"),
                base_url: non_empty_var("ALPACA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ALPACA_BASE_URL.to_string()),
            },
            deepseek: DeepSeekConfig {
                api_key: non_empty_var("DEEPSEEK_API_KEY"),
                base_url: non_empty_var("DEEPSEEK_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_DEEPSEEK_BASE_URL.to_string()),
            },
        })
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}='{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("SPHERE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("SPHERE_TEST_ENV_OR", 42u64), 42);
        std::env::set_var("SPHERE_TEST_ENV_OR", " 7 ");
        assert_eq!(env_or("SPHERE_TEST_ENV_OR", 42u64), 7);
        std::env::remove_var("SPHERE_TEST_ENV_OR");
        assert_eq!(env_or("SPHERE_TEST_ENV_OR", 42u64), 42);
    }

    #[test]
    fn test_non_empty_var() {
        std::env::set_var("SPHERE_TEST_BLANK", "   ");
        assert_eq!(non_empty_var("SPHERE_TEST_BLANK"), None);
        std::env::remove_var("SPHERE_TEST_BLANK");
    }
}
