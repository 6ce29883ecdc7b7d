//! Yahoo Finance API response models.
//!
//! Covers the quoteSummary, options and search endpoints. Chart data goes
//! through `yahoo_finance_api` and needs no models here.

use serde::Deserialize;

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    #[serde(default)]
    pub result: Vec<YahooQuoteSummaryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
    pub summary_profile: Option<YahooSummaryProfile>,
    pub summary_detail: Option<YahooSummaryDetail>,
}

/// Price module of quoteSummary
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub exchange_name: Option<String>,
    pub regular_market_price: Option<YahooPriceDetail>,
    pub regular_market_previous_close: Option<YahooPriceDetail>,
    pub regular_market_volume: Option<YahooPriceDetail>,
    pub market_cap: Option<YahooPriceDetail>,
}

/// Numeric field wrapper; Yahoo sends `{"raw": 1.0, "fmt": "1.00"}` or `{}`.
#[derive(Debug, Deserialize, Clone)]
pub struct YahooPriceDetail {
    pub raw: Option<f64>,
}

pub fn raw(detail: Option<&YahooPriceDetail>) -> Option<f64> {
    detail.and_then(|d| d.raw)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub long_business_summary: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryDetail {
    pub market_cap: Option<YahooPriceDetail>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<YahooPriceDetail>,
    pub fifty_two_week_high: Option<YahooPriceDetail>,
    pub fifty_two_week_low: Option<YahooPriceDetail>,
    pub average_volume: Option<YahooPriceDetail>,
}

/// Response of `/v7/finance/options/{symbol}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooOptionsResponse {
    pub option_chain: YahooOptionChainEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct YahooOptionChainEnvelope {
    #[serde(default)]
    pub result: Vec<YahooOptionChainResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooOptionChainResult {
    #[serde(default)]
    pub expiration_dates: Vec<i64>,
    pub quote: Option<YahooOptionUnderlying>,
    #[serde(default)]
    pub options: Vec<YahooOptionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooOptionUnderlying {
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooOptionSet {
    pub expiration_date: i64,
    #[serde(default)]
    pub calls: Vec<YahooOptionContract>,
    #[serde(default)]
    pub puts: Vec<YahooOptionContract>,
}

/// Option contracts carry plain numbers, unlike quoteSummary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooOptionContract {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub in_the_money: bool,
}

/// Response of `/v1/finance/search` when only news is requested
#[derive(Debug, Deserialize)]
pub struct YahooSearchResponse {
    #[serde(default)]
    pub news: Vec<YahooNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooNewsItem {
    pub uuid: String,
    pub title: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub provider_publish_time: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}
