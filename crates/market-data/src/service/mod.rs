//! Data access service.
//!
//! Every read goes through the same path: normalized cache key, cache lookup,
//! and on a miss a gated, time-limited upstream fetch (retried with backoff
//! for flaky providers) whose validated result is cached for the category's
//! TTL. Failures never escape: each operation has a degraded result.

pub mod analysis;
mod fallback;
pub mod insight;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{normalize_symbol, CacheStatus, CacheStore, Category, CategoryTtls};
use crate::errors::MarketDataError;
use crate::models::{
    AnalysisRequest, CompanyInfo, MarketAnalysis, NewsItem, OptionChain, OptionsRecommendation,
    PriceBar, SectorPerformance, Signal, StockQuote, TradeRecommendation,
};
use crate::provider::MarketDataProvider;
use crate::resilience::{run_with_retry, RateGate, RetryPolicy, Validate};

pub use fallback::fallback_news;

const SECTORS_KEY: &str = "sectors_all";
const MARKET_NEWS_ID: &str = "MARKET";
const RECOMMENDATION_PERIOD: &str = "1y";
const RECOMMENDATION_INTERVAL: &str = "1d";

/// Underlying price assumed for a mock chain when no quote is available.
const MOCK_FALLBACK_PRICE: f64 = 100.0;

/// Default upstream call timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for [`MarketDataService`].
#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub ttls: CategoryTtls,
    pub retry: RetryPolicy,
    pub upstream_timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            ttls: CategoryTtls::default(),
            retry: RetryPolicy::default(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

/// Cached, rate-gated access to one upstream provider.
pub struct MarketDataService {
    cache: Arc<CacheStore>,
    provider: Arc<dyn MarketDataProvider>,
    gate: Arc<RateGate>,
    config: MarketDataConfig,
}

impl MarketDataService {
    pub fn new(
        cache: Arc<CacheStore>,
        provider: Arc<dyn MarketDataProvider>,
        gate: Arc<RateGate>,
        config: MarketDataConfig,
    ) -> Self {
        Self {
            cache,
            provider,
            gate,
            config,
        }
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    fn retry_policy(&self) -> RetryPolicy {
        if self.provider.is_flaky() {
            self.config.retry.clone()
        } else {
            RetryPolicy::once()
        }
    }

    /// Typed cache lookup. An entry that no longer decodes is treated as a miss.
    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!("Cache hit for '{}'", key);
                Some(hit)
            }
            Err(e) => {
                warn!("Ignoring undecodable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    fn store<T: Serialize>(&self, category: Category, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => {
                if self.cache.set(key, payload, self.config.ttls.get(category)) {
                    let cache = Arc::clone(&self.cache);
                    tokio::task::spawn_blocking(move || cache.flush());
                }
            }
            Err(e) => warn!("Failed to encode '{}' for caching: {}", key, e),
        }
    }

    /// Cache-or-fetch for one key.
    ///
    /// Each attempt waits on the rate gate, runs `fetch` under the upstream
    /// timeout and validates the result. Only validated values are cached.
    async fn fetch_cached<T, F, Fut>(
        &self,
        category: Category,
        key: &str,
        fetch: F,
    ) -> Result<T, MarketDataError>
    where
        T: Serialize + DeserializeOwned + Validate,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        if let Some(hit) = self.cached::<T>(key) {
            return Ok(hit);
        }
        debug!("Cache miss for '{}'", key);

        let provider_id = self.provider.id();
        let timeout = self.config.upstream_timeout;
        let fetch = &fetch;

        let attempt = move || async move {
            self.gate.acquire(provider_id).await;
            let value = tokio::time::timeout(timeout, fetch())
                .await
                .map_err(|_| MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                })??;
            value.validate()?;
            Ok::<T, MarketDataError>(value)
        };

        let label = format!("{} fetch for '{}'", category, key);
        let value = run_with_retry(&label, &self.retry_policy(), attempt).await?;

        self.store(category, key, &value);
        Ok(value)
    }

    /// Upstream attempts spent before `error` was returned. Zero when the
    /// request was rejected before reaching the provider.
    fn attempts_for(&self, error: &MarketDataError) -> u32 {
        match error {
            MarketDataError::InvalidKey(_) => 0,
            _ => self.retry_policy().attempts(),
        }
    }

    fn log_degraded(&self, category: Category, identifier: &str, error: &MarketDataError) {
        match self.attempts_for(error) {
            0 => warn!(
                "{} for '{}' rejected before fetching, serving degraded result: {}",
                category, identifier, error
            ),
            attempts => warn!(
                "{} for {} unavailable after {} attempt(s), serving degraded result: {}",
                category, identifier, attempts, error
            ),
        }
    }

    // ========================================================================
    // Quotes and profiles
    // ========================================================================

    /// Latest quote, or `None` when it cannot be fetched.
    pub async fn get_quote(&self, symbol: &str) -> Option<StockQuote> {
        match self.fetch_quote(symbol).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                self.log_degraded(Category::Quote, symbol, &e);
                None
            }
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        let key = Category::Quote.key(&symbol, &[])?;
        self.fetch_cached(Category::Quote, &key, || self.provider.get_quote(&symbol))
            .await
    }

    pub async fn get_company_info(&self, symbol: &str) -> Option<CompanyInfo> {
        let result = async {
            let symbol = normalize_symbol(symbol)?;
            let key = Category::Info.key(&symbol, &[])?;
            self.fetch_cached(Category::Info, &key, || {
                self.provider.get_company_info(&symbol)
            })
            .await
        }
        .await;

        result
            .map_err(|e| self.log_degraded(Category::Info, symbol, &e))
            .ok()
    }

    /// Price bars for `period` at `interval`, empty when unavailable.
    pub async fn get_history(&self, symbol: &str, period: &str, interval: &str) -> Vec<PriceBar> {
        let result = async {
            let symbol = normalize_symbol(symbol)?;
            let key = Category::History.key(&symbol, &[period, interval])?;
            let period = period.trim().to_lowercase();
            let interval = interval.trim().to_lowercase();
            self.fetch_cached(Category::History, &key, || {
                self.provider.get_history(&symbol, &period, &interval)
            })
            .await
        }
        .await;

        result.unwrap_or_else(|e| {
            self.log_degraded(Category::History, symbol, &e);
            Vec::new()
        })
    }

    /// Sector ETF performance, best first.
    ///
    /// Each ETF goes through the cached quote path. The combined list is only
    /// cached when every sector resolved; otherwise the partial list is served.
    pub async fn get_sector_performance(&self) -> Vec<SectorPerformance> {
        if let Some(hit) = self.cached::<Vec<SectorPerformance>>(SECTORS_KEY) {
            return hit;
        }

        let quotes = join_all(
            analysis::SECTOR_ETFS
                .iter()
                .map(|(etf, _)| self.get_quote(etf)),
        )
        .await;

        let mut sectors: Vec<SectorPerformance> = analysis::SECTOR_ETFS
            .iter()
            .zip(quotes)
            .filter_map(|((etf, sector), quote)| {
                quote.map(|q| SectorPerformance {
                    sector: sector.to_string(),
                    symbol: etf.to_string(),
                    price: q.price,
                    change_percent: q.change_percent,
                })
            })
            .collect();
        sectors.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));

        if sectors.len() == analysis::SECTOR_ETFS.len() {
            self.store(Category::Sectors, SECTORS_KEY, &sectors);
        } else {
            warn!(
                "Sector performance incomplete ({} of {}), not caching",
                sectors.len(),
                analysis::SECTOR_ETFS.len()
            );
        }
        sectors
    }

    /// Headlines for `symbol`, or general market news. Falls back to a fixed
    /// placeholder list, which is not cached.
    pub async fn get_news(&self, symbol: Option<&str>) -> Vec<NewsItem> {
        let symbol = symbol.map(str::trim).filter(|s| !s.is_empty());
        let identifier = symbol.unwrap_or(MARKET_NEWS_ID);

        let result = async {
            let normalized = symbol.map(normalize_symbol).transpose()?;
            let key = Category::News.key(normalized.as_deref().unwrap_or(MARKET_NEWS_ID), &[])?;
            self.fetch_cached(Category::News, &key, || {
                self.provider.get_news(normalized.as_deref())
            })
            .await
        }
        .await;

        result.unwrap_or_else(|e| {
            self.log_degraded(Category::News, identifier, &e);
            fallback_news(identifier)
        })
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    /// SMA crossover signal over a year of daily bars.
    ///
    /// UNAVAILABLE results are returned but never cached.
    pub async fn get_trade_recommendation(&self, symbol: &str) -> TradeRecommendation {
        let (symbol, key) = match normalize_symbol(symbol)
            .and_then(|s| Category::Recommendation.key(&s, &[]).map(|k| (s, k)))
        {
            Ok(pair) => pair,
            Err(e) => {
                self.log_degraded(Category::Recommendation, symbol, &e);
                return TradeRecommendation::unavailable("Invalid symbol.");
            }
        };

        if let Some(hit) = self.cached::<TradeRecommendation>(&key) {
            return hit;
        }

        let bars = self
            .get_history(&symbol, RECOMMENDATION_PERIOD, RECOMMENDATION_INTERVAL)
            .await;
        let recommendation = analysis::trade_recommendation(&symbol, &bars);

        if recommendation.signal != Signal::Unavailable {
            self.store(Category::Recommendation, &key, &recommendation);
        }
        recommendation
    }

    /// Long call / long put suggestion following the trade signal.
    pub async fn get_options_recommendation(&self, symbol: &str) -> OptionsRecommendation {
        let trade = self.get_trade_recommendation(symbol).await;
        match trade.signal {
            Signal::Buy | Signal::Sell => {}
            Signal::Hold => return OptionsRecommendation::neutral(),
            Signal::Unavailable => {
                return OptionsRecommendation::unavailable(
                    "Not enough data to determine a trend for this stock.",
                )
            }
        }

        let expirations = self.get_option_expirations(symbol).await;
        let Some(target) = analysis::target_expiration(&expirations, Utc::now().date_naive())
        else {
            return OptionsRecommendation::unavailable("No options data available for this stock.");
        };

        match self.fetch_option_chain(symbol, Some(target)).await {
            Ok(chain) => analysis::options_recommendation(&chain.symbol, &trade, &chain),
            Err(e) => {
                self.log_degraded(Category::Options, symbol, &e);
                OptionsRecommendation::unavailable("Could not load the option chain.")
            }
        }
    }

    // ========================================================================
    // Options
    // ========================================================================

    pub async fn get_option_expirations(&self, symbol: &str) -> Vec<NaiveDate> {
        let result = async {
            let symbol = normalize_symbol(symbol)?;
            let key = Category::Options.scoped_key("expirations", &symbol, &[])?;
            self.fetch_cached(Category::Options, &key, || {
                self.provider.get_option_expirations(&symbol)
            })
            .await
        }
        .await;

        result.unwrap_or_else(|e| {
            self.log_degraded(Category::Options, symbol, &e);
            Vec::new()
        })
    }

    async fn fetch_option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        let which = expiration.map_or_else(|| "nearest".to_string(), |d| d.to_string());
        let key = Category::Options.key(&symbol, &[which.as_str()])?;
        self.fetch_cached(Category::Options, &key, || {
            self.provider.get_option_chain(&symbol, expiration)
        })
        .await
    }

    /// Option chain trimmed to `limit` strikes per side around the price,
    /// capped at [`analysis::MAX_CHAIN_LIMIT`].
    ///
    /// When live data is unavailable a synthetic chain flagged `is_mock` is
    /// served instead; it is never cached.
    pub async fn get_option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> OptionChain {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(analysis::DEFAULT_CHAIN_LIMIT)
            .min(analysis::MAX_CHAIN_LIMIT);

        match self.fetch_option_chain(symbol, expiration).await {
            Ok(mut chain) => {
                chain.truncate_around_price(limit);
                chain
            }
            Err(e) => {
                self.log_degraded(Category::Options, symbol, &e);

                let symbol = normalize_symbol(symbol).unwrap_or_else(|_| symbol.trim().to_uppercase());
                let price = self
                    .get_quote(&symbol)
                    .await
                    .map_or(MOCK_FALLBACK_PRICE, |q| q.price);
                let expiration = expiration
                    .unwrap_or_else(|| analysis::default_mock_expiration(Utc::now().date_naive()));

                info!("Serving mock option chain for {} at {}", symbol, expiration);
                analysis::mock_option_chain(&symbol, price, expiration, limit)
            }
        }
    }

    // ========================================================================
    // Market analysis
    // ========================================================================

    /// Portfolio-level analysis of `request`'s symbols and predictions.
    ///
    /// Never calls the provider: sector concentration only uses company
    /// profiles already in the cache. Results are cached per distinct request.
    /// Fails with [`MarketDataError::InvalidKey`] when the symbol list is
    /// empty, too long or holds a malformed symbol.
    pub fn analyze_market(
        &self,
        request: &AnalysisRequest,
    ) -> Result<MarketAnalysis, MarketDataError> {
        let mut symbols: Vec<String> = Vec::with_capacity(request.symbols.len());
        for raw in &request.symbols {
            let symbol = normalize_symbol(raw)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            return Err(MarketDataError::InvalidKey(
                "no symbols to analyze".to_string(),
            ));
        }
        if symbols.len() > insight::MAX_ANALYSIS_SYMBOLS {
            return Err(MarketDataError::InvalidKey(format!(
                "at most {} symbols per analysis, got {}",
                insight::MAX_ANALYSIS_SYMBOLS,
                symbols.len()
            )));
        }

        let fingerprint = insight::request_fingerprint(&symbols, request);
        let key = Category::Analysis.key(&symbols.join(","), &[fingerprint.as_str()])?;
        if let Some(hit) = self.cached::<MarketAnalysis>(&key) {
            return Ok(hit);
        }

        let sectors: Vec<String> = symbols
            .iter()
            .filter_map(|symbol| {
                let key = Category::Info.key(symbol, &[]).ok()?;
                self.cached::<CompanyInfo>(&key)?.sector
            })
            .collect();

        let analysis =
            insight::build_analysis(&symbols, &sectors, &request.rl_predictions, Utc::now());
        info!(
            "Market analysis for {} symbol(s): {:?} sentiment, {} opportunities",
            symbols.len(),
            analysis.market_context,
            analysis.opportunities.len()
        );
        self.store(Category::Analysis, &key, &analysis);
        Ok(analysis)
    }

    // ========================================================================
    // Cache administration
    // ========================================================================

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Drop every cached entry and the snapshot file.
    pub fn clear_cache(&self) -> usize {
        self.cache.invalidate_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ManualClock};
    use crate::models::{OptionContract, OptionKind, OptionsStrategy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Calls {
        quote: AtomicUsize,
        info: AtomicUsize,
        history: AtomicUsize,
        news: AtomicUsize,
        expirations: AtomicUsize,
        chain: AtomicUsize,
    }

    /// In-memory provider with scripted failures and latency.
    struct ScriptedProvider {
        flaky: bool,
        down: bool,
        failures_left: AtomicUsize,
        latency: Duration,
        price: f64,
        history: Vec<PriceBar>,
        expirations: Vec<NaiveDate>,
        calls: Calls,
    }

    impl ScriptedProvider {
        fn healthy() -> Self {
            Self {
                flaky: true,
                down: false,
                failures_left: AtomicUsize::new(0),
                latency: Duration::ZERO,
                price: 190.0,
                history: Vec::new(),
                expirations: Vec::new(),
                calls: Calls::default(),
            }
        }

        fn down() -> Self {
            Self {
                down: true,
                ..Self::healthy()
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(n),
                ..Self::healthy()
            }
        }

        async fn respond<T>(&self, counter: &AtomicUsize, value: impl FnOnce() -> T) -> Result<T, MarketDataError> {
            counter.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.down {
                return Err(MarketDataError::provider("SCRIPTED", "service down"));
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(MarketDataError::provider("SCRIPTED", "transient failure"));
            }
            Ok(value())
        }
    }

    fn contract(kind: OptionKind, strike: f64, expiration: NaiveDate) -> OptionContract {
        OptionContract {
            contract_symbol: format!("AAPL{strike}"),
            kind,
            strike,
            last_price: 2.0,
            bid: 1.9,
            ask: 2.1,
            volume: 10,
            open_interest: 100,
            implied_volatility: 0.3,
            in_the_money: false,
            expiration,
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            "SCRIPTED"
        }

        fn is_flaky(&self) -> bool {
            self.flaky
        }

        async fn get_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
            let price = self.price;
            self.respond(&self.calls.quote, || {
                StockQuote::from_prices(symbol, Some("Scripted".into()), price, Some(price - 1.0), 100)
            })
            .await
        }

        async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError> {
            self.respond(&self.calls.info, || CompanyInfo::with_name(symbol, "Scripted Inc."))
                .await
        }

        async fn get_history(
            &self,
            _symbol: &str,
            _period: &str,
            _interval: &str,
        ) -> Result<Vec<PriceBar>, MarketDataError> {
            self.respond(&self.calls.history, || self.history.clone()).await
        }

        async fn get_news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>, MarketDataError> {
            let id = symbol.unwrap_or("market").to_string();
            self.respond(&self.calls.news, || {
                vec![NewsItem::new(format!("n-{id}"), "Headline", "Wire", "https://example.com", 1)]
            })
            .await
        }

        async fn get_option_expirations(&self, _symbol: &str) -> Result<Vec<NaiveDate>, MarketDataError> {
            self.respond(&self.calls.expirations, || self.expirations.clone())
                .await
        }

        async fn get_option_chain(
            &self,
            symbol: &str,
            expiration: Option<NaiveDate>,
        ) -> Result<OptionChain, MarketDataError> {
            let expiration = expiration
                .or_else(|| self.expirations.first().copied())
                .unwrap_or_else(|| NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
            let price = self.price;
            self.respond(&self.calls.chain, || OptionChain {
                symbol: symbol.to_string(),
                expiration,
                underlying_price: price,
                calls: [180.0, 190.0, 200.0]
                    .into_iter()
                    .map(|s| contract(OptionKind::Call, s, expiration))
                    .collect(),
                puts: [180.0, 190.0, 200.0]
                    .into_iter()
                    .map(|s| contract(OptionKind::Put, s, expiration))
                    .collect(),
                is_mock: false,
            })
            .await
        }
    }

    struct Harness {
        service: MarketDataService,
        provider: Arc<ScriptedProvider>,
        cache: Arc<CacheStore>,
        _dir: tempfile::TempDir,
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        harness_with_flush(provider, 0)
    }

    fn harness_with_flush(provider: ScriptedProvider, flush_every: u64) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open_with_clock(
            CacheConfig {
                path: dir.path().join("cache.json"),
                flush_every,
            },
            Arc::new(ManualClock::default()),
        ));
        let provider = Arc::new(provider);
        let service = MarketDataService::new(
            cache.clone(),
            provider.clone(),
            Arc::new(RateGate::new(Duration::from_millis(100))),
            MarketDataConfig::default(),
        );
        Harness {
            service,
            provider,
            cache,
            _dir: dir,
        }
    }

    fn rising_bars(n: usize) -> Vec<PriceBar> {
        (1..=n)
            .map(|i| PriceBar {
                date: format!("day-{i}"),
                open: i as f64,
                high: i as f64,
                low: i as f64,
                close: i as f64,
                volume: 1,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit_fetches_once() {
        let h = harness(ScriptedProvider::healthy());

        let first = h.service.get_quote("aapl").await.unwrap();
        let second = h.service.get_quote("AAPL ").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 1);
        assert_eq!(h.cache.keys(), vec!["quote_AAPL".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_driven_flush_runs_off_the_executor() {
        let h = harness_with_flush(ScriptedProvider::healthy(), 1);
        let path = h.cache.path().to_path_buf();

        h.service.get_quote("AAPL").await.unwrap();

        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_provider_recovers_after_two_failures() {
        let h = harness(ScriptedProvider::failing_first(2));

        let quote = h.service.get_quote("MSFT").await;

        assert!(quote.is_some());
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_is_degraded_and_not_cached() {
        let h = harness(ScriptedProvider::down());

        assert!(h.service.get_quote("MSFT").await.is_none());
        assert!(h.service.get_company_info("MSFT").await.is_none());
        assert!(h.service.get_history("MSFT", "1y", "1d").await.is_empty());
        assert!(h.service.get_option_expirations("MSFT").await.is_empty());

        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 3);
        assert!(h.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_provider_is_called_once() {
        let h = harness(ScriptedProvider {
            flaky: false,
            ..ScriptedProvider::down()
        });

        assert!(h.service.get_quote("MSFT").await.is_none());
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_payload_is_retried_and_not_cached() {
        let h = harness(ScriptedProvider {
            price: 0.0,
            ..ScriptedProvider::healthy()
        });

        assert!(h.service.get_quote("AAPL").await.is_none());
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 3);
        assert!(h.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_upstream_times_out() {
        let h = harness(ScriptedProvider {
            latency: Duration::from_secs(30),
            ..ScriptedProvider::healthy()
        });

        assert!(h.service.get_quote("AAPL").await.is_none());
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_symbol_never_reaches_provider() {
        let h = harness(ScriptedProvider::healthy());

        assert!(h.service.get_quote("   ").await.is_none());
        assert_eq!(
            h.service.get_trade_recommendation("").await.signal,
            Signal::Unavailable
        );
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 0);
        assert_eq!(h.provider.calls.history.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_attempts_reported_for_degraded_results() {
        let flaky = harness(ScriptedProvider::healthy());
        let stable = harness(ScriptedProvider {
            flaky: false,
            ..ScriptedProvider::healthy()
        });
        let upstream = MarketDataError::provider("SCRIPTED", "down");
        let rejected = MarketDataError::InvalidKey("empty identifier".into());

        assert_eq!(flaky.service.attempts_for(&upstream), 3);
        assert_eq!(stable.service.attempts_for(&upstream), 1);
        assert_eq!(flaky.service.attempts_for(&rejected), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_key_includes_parameters() {
        let h = harness(ScriptedProvider {
            history: rising_bars(5),
            ..ScriptedProvider::healthy()
        });

        assert_eq!(h.service.get_history("AAPL", "1y", "1d").await.len(), 5);
        h.service.get_history("AAPL", "1y", "1wk").await;
        h.service.get_history("aapl", "1Y", "1D").await;

        assert_eq!(h.provider.calls.history.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_falls_back_when_down() {
        let h = harness(ScriptedProvider::down());

        let news = h.service.get_news(Some("AAPL")).await;
        assert!(!news.is_empty());
        assert!(news[0].uuid.starts_with("fallback-aapl"));
        assert!(h.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_news_key() {
        let h = harness(ScriptedProvider::healthy());

        let news = h.service.get_news(None).await;
        assert_eq!(news[0].uuid, "n-market");
        h.service.get_news(Some("  ")).await;

        assert_eq!(h.provider.calls.news.load(Ordering::SeqCst), 1);
        assert_eq!(h.cache.keys(), vec!["news_MARKET".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trade_recommendation_is_cached() {
        let h = harness(ScriptedProvider {
            history: rising_bars(250),
            ..ScriptedProvider::healthy()
        });

        let rec = h.service.get_trade_recommendation("AAPL").await;
        assert_eq!(rec.signal, Signal::Buy);

        h.cache.invalidate_all();
        h.service.get_trade_recommendation("AAPL").await;
        let again = h.service.get_trade_recommendation("AAPL").await;

        assert_eq!(again, rec);
        assert_eq!(h.provider.calls.history.load(Ordering::SeqCst), 2);
        assert!(h.cache.keys().contains(&"recommendation_AAPL".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_recommendation_not_cached() {
        let h = harness(ScriptedProvider {
            history: rising_bars(20),
            ..ScriptedProvider::healthy()
        });

        let rec = h.service.get_trade_recommendation("AAPL").await;
        assert_eq!(rec.signal, Signal::Unavailable);
        assert!(!h.cache.keys().contains(&"recommendation_AAPL".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_options_recommendation_long_call() {
        let today = Utc::now().date_naive();
        let h = harness(ScriptedProvider {
            history: rising_bars(250),
            expirations: vec![
                today + chrono::Duration::days(7),
                today + chrono::Duration::days(35),
            ],
            ..ScriptedProvider::healthy()
        });

        let rec = h.service.get_options_recommendation("AAPL").await;

        assert_eq!(rec.strategy, OptionsStrategy::LongCall);
        let contract = rec.contract.unwrap();
        // current price is the last close (250), above every strike
        assert_eq!(contract.strike, 200.0);
        assert_eq!(contract.expiration, today + chrono::Duration::days(35));
    }

    #[tokio::test(start_paused = true)]
    async fn test_options_recommendation_without_expirations() {
        let h = harness(ScriptedProvider {
            history: rising_bars(250),
            ..ScriptedProvider::healthy()
        });

        let rec = h.service.get_options_recommendation("AAPL").await;
        assert_eq!(rec.strategy, OptionsStrategy::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_option_chain_falls_back_to_mock() {
        let h = harness(ScriptedProvider::down());

        let chain = h.service.get_option_chain("AAPL", None, Some(4)).await;

        assert!(chain.is_mock);
        assert_eq!(chain.calls.len(), 4);
        assert_eq!(chain.underlying_price, MOCK_FALLBACK_PRICE);
        assert!(!h
            .cache
            .keys()
            .iter()
            .any(|k| k.starts_with("options_")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_option_chain_limit_is_capped() {
        let h = harness(ScriptedProvider::down());

        let chain = h.service.get_option_chain("AAPL", None, Some(usize::MAX)).await;

        assert!(chain.is_mock);
        assert_eq!(chain.calls.len(), analysis::MAX_CHAIN_LIMIT);
        assert_eq!(chain.puts.len(), analysis::MAX_CHAIN_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_option_chain_live_and_cached() {
        let h = harness(ScriptedProvider::healthy());

        let chain = h.service.get_option_chain("aapl", None, Some(2)).await;
        assert!(!chain.is_mock);
        assert_eq!(chain.calls.len(), 2);

        let full = h.service.get_option_chain("AAPL", None, None).await;
        assert_eq!(full.calls.len(), 3);
        assert_eq!(h.provider.calls.chain.load(Ordering::SeqCst), 1);
        assert!(h.cache.keys().contains(&"options_AAPL_nearest".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sector_performance_cached_when_complete() {
        let h = harness(ScriptedProvider::healthy());

        let sectors = h.service.get_sector_performance().await;
        assert_eq!(sectors.len(), analysis::SECTOR_ETFS.len());
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 11);

        h.service.get_sector_performance().await;
        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 11);
        assert!(h.cache.keys().contains(&"sectors_all".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sector_performance_degrades_to_empty() {
        let h = harness(ScriptedProvider::down());
        assert!(h.service.get_sector_performance().await.is_empty());
        assert!(h.cache.is_empty());
    }

    fn analysis_request(symbols: &[&str], predictions: &[(&str, f64, f64)]) -> AnalysisRequest {
        AnalysisRequest {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            rl_predictions: predictions
                .iter()
                .map(|(symbol, prediction, confidence)| crate::models::ModelPrediction {
                    symbol: symbol.to_string(),
                    prediction: *prediction,
                    confidence: *confidence,
                })
                .collect(),
            analysis_type: Some("trading_opportunities".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_analysis_is_cached_per_request() {
        let h = harness(ScriptedProvider::healthy());
        let request = analysis_request(&["aapl", "MSFT", "AAPL"], &[("AAPL", 0.7, 0.9)]);

        let first = h.service.analyze_market(&request).unwrap();
        assert_eq!(first.opportunities, vec!["AAPL"]);

        let second = h.service.analyze_market(&request).unwrap();
        assert_eq!(first, second);

        let keys = h.cache.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("analysis_AAPL,MSFT_"));

        let changed = analysis_request(&["AAPL", "MSFT"], &[("AAPL", -0.7, 0.9)]);
        let third = h.service.analyze_market(&changed).unwrap();
        assert_eq!(third.opportunities, vec!["AAPL"]);
        assert_ne!(third.detailed_analysis, first.detailed_analysis);
        assert_eq!(h.cache.keys().len(), 2);

        assert_eq!(h.provider.calls.quote.load(Ordering::SeqCst), 0);
        assert_eq!(h.provider.calls.info.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_analysis_uses_cached_sectors() {
        let h = harness(ScriptedProvider::healthy());
        for symbol in ["AAPL", "MSFT"] {
            h.cache.set(
                format!("info_{symbol}"),
                serde_json::to_value(CompanyInfo::with_name(symbol, "Tech").sector("Technology"))
                    .unwrap(),
                Duration::from_secs(3600),
            );
        }

        let request = analysis_request(&["AAPL", "MSFT", "XOM"], &[]);
        let analysis = h.service.analyze_market(&request).unwrap();

        assert!(analysis
            .risk_factors
            .contains(&"Sector Concentration".to_string()));
        assert_eq!(h.provider.calls.info.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_market_analysis_rejects_bad_symbols() {
        let h = harness(ScriptedProvider::healthy());

        let empty = analysis_request(&[], &[]);
        assert!(matches!(
            h.service.analyze_market(&empty),
            Err(MarketDataError::InvalidKey(_))
        ));

        let malformed = analysis_request(&["BRK B"], &[]);
        assert!(h.service.analyze_market(&malformed).is_err());

        let many: Vec<String> = (0..=insight::MAX_ANALYSIS_SYMBOLS)
            .map(|i| format!("S{i}"))
            .collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        assert!(h.service.analyze_market(&analysis_request(&many, &[])).is_err());
        assert!(h.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_refetch() {
        let h = harness(ScriptedProvider::healthy());

        h.service.get_company_info("AAPL").await.unwrap();
        assert_eq!(h.service.cache_status().entries, 1);
        assert_eq!(h.service.clear_cache(), 1);

        h.service.get_company_info("AAPL").await.unwrap();
        assert_eq!(h.provider.calls.info.load(Ordering::SeqCst), 2);
    }
}
