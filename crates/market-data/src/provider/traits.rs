//! Upstream market data provider trait.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{CompanyInfo, NewsItem, OptionChain, PriceBar, StockQuote};

/// An upstream source of market data.
///
/// Implementations do plain fetches. Caching, rate gating, retries and
/// validation are applied around them by
/// [`MarketDataService`](crate::service::MarketDataService).
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use alphasphere_market_data::provider::MarketDataProvider;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Constant identifier like "YAHOO". Used for logging and as the
    /// rate gate source key.
    fn id(&self) -> &'static str;

    /// Whether calls should be retried with backoff on failure.
    fn is_flaky(&self) -> bool {
        false
    }

    /// Latest quote for an (already normalized) symbol.
    async fn get_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError>;

    async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError>;

    /// OHLCV bars for `period` (e.g. "1y") at `interval` (e.g. "1d"),
    /// ordered oldest first.
    async fn get_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<PriceBar>, MarketDataError>;

    /// Headlines for a symbol, or general market news when `None`.
    async fn get_news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>, MarketDataError>;

    /// Listed option expiration dates, ascending.
    async fn get_option_expirations(&self, symbol: &str)
        -> Result<Vec<NaiveDate>, MarketDataError>;

    /// Calls and puts for `expiration`, or the nearest listed expiration.
    async fn get_option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError>;
}
