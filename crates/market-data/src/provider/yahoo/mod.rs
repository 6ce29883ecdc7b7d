//! Yahoo Finance market data provider.
//!
//! Chart data (quotes fallback, history) comes through `yahoo_finance_api`.
//! Company profiles, live quotes and option chains come from the JSON
//! endpoints behind Yahoo's crumb/cookie handshake; headlines come from the
//! public search endpoint.

mod models;

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{
    CompanyInfo, NewsItem, OptionChain, OptionContract, OptionKind, PriceBar, StockQuote,
};
use crate::provider::MarketDataProvider;

use models::{
    raw, YahooOptionContract, YahooOptionsResponse, YahooQuoteSummaryResponse,
    YahooQuoteSummaryResult, YahooSearchResponse,
};

const PROVIDER_ID: &str = "YAHOO";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";

/// Search query used when no symbol is given for news.
const MARKET_NEWS_QUERY: &str = "stock market";
const NEWS_COUNT: u32 = 10;

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance provider. Yahoo throttles and drops requests without
/// notice, so it reports itself as flaky.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooProvider {
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            connector,
            client,
            crumb: RwLock::new(None),
        })
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        {
            let guard = self.crumb.read().unwrap_or_else(|p| p.into_inner());
            if let Some(crumb) = guard.as_ref() {
                return Ok(crumb.clone());
            }
        }

        self.fetch_crumb().await
    }

    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| MarketDataError::provider(PROVIDER_ID, "Failed to parse Yahoo cookie"))?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to get crumb: {}", e)))?
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to read crumb: {}", e)))?;

        let crumb_data = CrumbData { cookie, crumb };
        *self.crumb.write().unwrap_or_else(|p| p.into_inner()) = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication fails)
    fn clear_crumb(&self) {
        *self.crumb.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    // ========================================================================
    // JSON endpoints
    // ========================================================================

    /// GET `url` and decode the body, mapping HTTP failures for `symbol`.
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        what: &str,
        auth: Option<&CrumbData>,
    ) -> Result<T, MarketDataError> {
        let mut request = self.client.get(url);
        if let Some(auth) = auth {
            request = request.header(header::COOKIE, &auth.cookie);
        }

        let response = request.send().await.map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("{} request failed: {}", what, e))
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                self.clear_crumb();
                return Err(MarketDataError::provider(
                    PROVIDER_ID,
                    "Yahoo authentication expired",
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            StatusCode::NOT_FOUND => return Err(MarketDataError::SymbolNotFound(symbol.to_string())),
            status => {
                return Err(MarketDataError::provider(
                    PROVIDER_ID,
                    format!("{} returned HTTP {}", what, status),
                ))
            }
        }

        response.json::<T>().await.map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to parse {} response: {}", what, e),
            )
        })
    }

    /// Same as [`fetch_json`](Self::fetch_json) with the crumb appended.
    async fn fetch_json_with_crumb<T: DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        what: &str,
    ) -> Result<T, MarketDataError> {
        let auth = self.ensure_crumb().await?;
        let separator = if url.contains('?') { '&' } else { '?' };
        let url = format!("{}{}crumb={}", url, separator, encode(&auth.crumb));
        self.fetch_json(&url, symbol, what, Some(&auth)).await
    }

    async fn fetch_quote_summary(
        &self,
        symbol: &str,
        modules: &str,
    ) -> Result<YahooQuoteSummaryResult, MarketDataError> {
        let url = format!(
            "{}/{}?modules={}",
            QUOTE_SUMMARY_URL,
            encode(symbol),
            modules
        );
        let data: YahooQuoteSummaryResponse = self
            .fetch_json_with_crumb(&url, symbol, "quoteSummary")
            .await?;

        data.quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    async fn fetch_options(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<YahooOptionsResponse, MarketDataError> {
        let mut url = format!("{}/{}", OPTIONS_URL, encode(symbol));
        if let Some(date) = expiration {
            url.push_str(&format!("?date={}", date_to_unix(date)));
        }
        self.fetch_json_with_crumb(&url, symbol, "options").await
    }

    // ========================================================================
    // Quote Fetching
    // ========================================================================

    /// Live quote from the quoteSummary price module.
    async fn fetch_quote_primary(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let result = self.fetch_quote_summary(symbol, "price").await?;
        let price = result
            .price
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let last = raw(price.regular_market_price.as_ref())
            .ok_or_else(|| MarketDataError::validation("No valid price in quote response"))?;
        let name = format_name(
            price.long_name.as_deref(),
            price.quote_type.as_deref().unwrap_or(""),
            price.short_name.as_deref(),
            symbol,
        );

        Ok(StockQuote::from_prices(
            symbol,
            Some(name),
            last,
            raw(price.regular_market_previous_close.as_ref()),
            raw(price.regular_market_volume.as_ref()).map_or(0, |v| v as u64),
        ))
    }

    /// Quote derived from the last two daily chart bars.
    async fn fetch_quote_backup(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let response = self
            .connector
            .get_quote_range(symbol, "1d", "5d")
            .await
            .map_err(|e| map_yahoo_error(symbol, e))?;
        let quotes = response.quotes().map_err(|e| map_yahoo_error(symbol, e))?;

        let last = quotes
            .last()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
        let previous_close = quotes
            .len()
            .checked_sub(2)
            .and_then(|i| quotes.get(i))
            .map(|q| q.close);

        Ok(StockQuote::from_prices(
            symbol,
            None,
            last.close,
            previous_close,
            last.volume as u64,
        ))
    }

    // ========================================================================
    // Profile Fetching
    // ========================================================================

    async fn fetch_info_search(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError> {
        let result = self
            .connector
            .search_ticker(&encode(symbol))
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))?;

        let item = result
            .quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let mut info = CompanyInfo::with_name(
            symbol,
            format_name(
                Some(&item.long_name),
                &item.quote_type,
                Some(&item.short_name),
                symbol,
            ),
        );
        info.exchange = Some(item.exchange.clone()).filter(|e| !e.is_empty());
        Ok(info)
    }
}

fn map_quote_summary_to_info(symbol: &str, result: &YahooQuoteSummaryResult) -> CompanyInfo {
    let price = result.price.as_ref();
    let summary = result.summary_profile.as_ref();
    let detail = result.summary_detail.as_ref();

    let name = format_name(
        price.and_then(|p| p.long_name.as_deref()),
        price.and_then(|p| p.quote_type.as_deref()).unwrap_or(""),
        price.and_then(|p| p.short_name.as_deref()),
        symbol,
    );

    CompanyInfo {
        symbol: symbol.to_string(),
        name: Some(name),
        sector: summary.and_then(|s| s.sector.as_deref()).map(format_sector),
        industry: summary.and_then(|s| s.industry.clone()),
        exchange: price.and_then(|p| p.exchange_name.clone()),
        market_cap: raw(detail.and_then(|d| d.market_cap.as_ref()))
            .or_else(|| raw(price.and_then(|p| p.market_cap.as_ref()))),
        description: summary.and_then(|s| s.long_business_summary.clone().or(s.description.clone())),
        pe_ratio: raw(detail.and_then(|d| d.trailing_pe.as_ref())),
        high_52_week: raw(detail.and_then(|d| d.fifty_two_week_high.as_ref())),
        low_52_week: raw(detail.and_then(|d| d.fifty_two_week_low.as_ref())),
        avg_volume: raw(detail.and_then(|d| d.average_volume.as_ref())).map(|v| v as u64),
    }
}

fn map_contract(contract: YahooOptionContract, kind: OptionKind, expiration: NaiveDate) -> OptionContract {
    OptionContract {
        contract_symbol: contract.contract_symbol,
        kind,
        strike: contract.strike,
        last_price: contract.last_price.unwrap_or(0.0),
        bid: contract.bid.unwrap_or(0.0),
        ask: contract.ask.unwrap_or(0.0),
        volume: contract.volume.unwrap_or(0),
        open_interest: contract.open_interest.unwrap_or(0),
        implied_volatility: contract.implied_volatility.unwrap_or(0.0),
        in_the_money: contract.in_the_money,
        expiration,
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn is_flaky(&self) -> bool {
        true
    }

    async fn get_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        debug!("Fetching quote for {} from Yahoo", symbol);

        match self.fetch_quote_primary(symbol).await {
            Ok(quote) => return Ok(quote),
            Err(e) => {
                debug!(
                    "Primary quote fetch failed for {}: {}, trying chart backup",
                    symbol, e
                );
            }
        }

        self.fetch_quote_backup(symbol).await
    }

    async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError> {
        debug!("Fetching company info for {} from Yahoo", symbol);

        match self
            .fetch_quote_summary(symbol, "price,summaryProfile,summaryDetail")
            .await
        {
            Ok(result) => return Ok(map_quote_summary_to_info(symbol, &result)),
            Err(e) => {
                debug!(
                    "quoteSummary failed for {}: {}, trying search fallback",
                    symbol, e
                );
            }
        }

        self.fetch_info_search(symbol).await
    }

    async fn get_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        debug!(
            "Fetching {} history at {} for {} from Yahoo",
            period, interval, symbol
        );

        let response = self
            .connector
            .get_quote_range(symbol, interval, period)
            .await
            .map_err(|e| map_yahoo_error(symbol, e))?;

        match response.quotes() {
            Ok(quotes) => {
                let bars: Vec<PriceBar> = quotes
                    .into_iter()
                    .filter_map(|q| {
                        let date = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                        Some(PriceBar {
                            date: date.format("%Y-%m-%d").to_string(),
                            open: q.open,
                            high: q.high,
                            low: q.low,
                            close: q.close,
                            volume: q.volume as u64,
                        })
                    })
                    .collect();

                if bars.is_empty() {
                    return Err(MarketDataError::NoDataForRange);
                }
                Ok(bars)
            }
            Err(yahoo::YahooError::NoQuotes) => {
                warn!("No history returned for '{}' ({})", symbol, period);
                Err(MarketDataError::NoDataForRange)
            }
            Err(e) => Err(MarketDataError::provider(PROVIDER_ID, e.to_string())),
        }
    }

    async fn get_news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>, MarketDataError> {
        let query = symbol.unwrap_or(MARKET_NEWS_QUERY);
        debug!("Fetching news for '{}' from Yahoo", query);

        let url = format!(
            "{}?q={}&quotesCount=0&newsCount={}",
            SEARCH_URL,
            encode(query),
            NEWS_COUNT
        );
        let data: YahooSearchResponse = self.fetch_json(&url, query, "search", None).await?;

        Ok(data
            .news
            .into_iter()
            .map(|item| {
                let mut news = NewsItem::new(
                    item.uuid,
                    item.title,
                    item.publisher,
                    item.link,
                    item.provider_publish_time,
                );
                if let Some(kind) = item.kind {
                    news.kind = kind;
                }
                news
            })
            .collect())
    }

    async fn get_option_expirations(
        &self,
        symbol: &str,
    ) -> Result<Vec<NaiveDate>, MarketDataError> {
        debug!("Fetching option expirations for {} from Yahoo", symbol);

        let data = self.fetch_options(symbol, None).await?;
        let result = data
            .option_chain
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let mut dates: Vec<NaiveDate> = result
            .expiration_dates
            .into_iter()
            .filter_map(unix_to_date)
            .collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    async fn get_option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        debug!(
            "Fetching option chain for {} ({}) from Yahoo",
            symbol,
            expiration.map_or_else(|| "nearest".to_string(), |d| d.to_string())
        );

        let data = self.fetch_options(symbol, expiration).await?;
        let result = data
            .option_chain
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let underlying_price = result
            .quote
            .and_then(|q| q.regular_market_price)
            .unwrap_or(0.0);
        let set = result
            .options
            .into_iter()
            .next()
            .ok_or(MarketDataError::NoDataForRange)?;
        let expiration = unix_to_date(set.expiration_date)
            .ok_or_else(|| MarketDataError::validation("Invalid option expiration timestamp"))?;

        Ok(OptionChain {
            symbol: symbol.to_string(),
            expiration,
            underlying_price,
            calls: set
                .calls
                .into_iter()
                .map(|c| map_contract(c, OptionKind::Call, expiration))
                .collect(),
            puts: set
                .puts
                .into_iter()
                .map(|c| map_contract(c, OptionKind::Put, expiration))
                .collect(),
            is_mock: false,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn map_yahoo_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
    if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
        MarketDataError::SymbolNotFound(symbol.to_string())
    } else {
        MarketDataError::provider(PROVIDER_ID, e.to_string())
    }
}

fn unix_to_date(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

fn date_to_unix(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map_or(0, |dt| Utc.from_utc_datetime(&dt).timestamp())
}

/// Clean up long names, falling back to the short name or the symbol.
fn format_name(
    long_name: Option<&str>,
    quote_type: &str,
    short_name: Option<&str>,
    symbol: &str,
) -> String {
    let name = long_name.unwrap_or("").trim().replace("&amp;", "&");

    // Futures carry a date suffix in the short name
    if quote_type.eq_ignore_ascii_case("FUTURE") {
        if let Some(sn) = short_name {
            if sn.len() >= 7 && sn.is_char_boundary(sn.len() - 7) {
                return sn[..sn.len() - 7].to_string();
            }
        }
    }

    if name.is_empty() {
        short_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(symbol)
            .to_string()
    } else {
        name
    }
}

/// Convert snake_case sector to Title Case.
fn format_sector(sector: &str) -> String {
    sector
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
