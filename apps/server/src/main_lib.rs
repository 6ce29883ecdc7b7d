use std::sync::Arc;

use alphasphere_market_data::{
    CacheConfig, CacheStore, MarketDataConfig, MarketDataProvider, MarketDataService, RateGate,
    RetryPolicy, YahooProvider,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AlpacaConfig, Config, DeepSeekConfig};

pub struct AppState {
    pub market: Arc<MarketDataService>,
    pub cache: Arc<CacheStore>,
    /// Shared client for the brokerage and chat pass-through routes.
    pub http: reqwest::Client,
    pub alpaca: AlpacaConfig,
    pub deepseek: DeepSeekConfig,
}

pub fn init_tracing() {
    let log_format = std::env::var("SPHERE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let provider = Arc::new(YahooProvider::new()?);
    build_state_with_provider(config, provider).await
}

/// Compose the application around an explicit upstream provider.
pub async fn build_state_with_provider(
    config: &Config,
    provider: Arc<dyn MarketDataProvider>,
) -> anyhow::Result<Arc<AppState>> {
    let cache_config = CacheConfig {
        path: config.cache_file.clone(),
        flush_every: config.cache_flush_every,
    };
    // Hydration reads the snapshot file
    let cache = tokio::task::spawn_blocking(move || CacheStore::open(cache_config))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open cache store: {}", e))?;
    let cache = Arc::new(cache);
    tracing::info!(
        "Cache store at {} ({} entries)",
        cache.path().display(),
        cache.len()
    );

    let market_config = MarketDataConfig {
        ttls: config.ttls.clone(),
        retry: RetryPolicy::new(config.retry_attempts, config.retry_base_delay),
        upstream_timeout: config.upstream_timeout,
    };
    let gate = Arc::new(RateGate::new(config.rate_gate_interval));
    let market = Arc::new(MarketDataService::new(
        cache.clone(),
        provider,
        gate,
        market_config,
    ));

    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;

    Ok(Arc::new(AppState {
        market,
        cache,
        http,
        alpaca: config.alpaca.clone(),
        deepseek: config.deepseek.clone(),
    }))
}
