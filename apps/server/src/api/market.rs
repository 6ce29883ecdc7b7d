use std::sync::Arc;

use alphasphere_market_data::{
    CompanyInfo, NewsItem, OptionChain, OptionsRecommendation, PriceBar, SectorPerformance,
    StockQuote, TradeRecommendation,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const DEFAULT_PERIOD: &str = "1y";
const DEFAULT_INTERVAL: &str = "1d";

async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StockQuote>> {
    state
        .market
        .get_quote(&symbol)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Quote not available for {}", symbol)))
}

async fn get_company_info(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CompanyInfo>> {
    state
        .market
        .get_company_info(&symbol)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Company info not available for {}", symbol)))
}

#[derive(Deserialize)]
struct HistoryQuery {
    period: Option<String>,
    interval: Option<String>,
}

async fn get_history(
    Path(symbol): Path<String>,
    Query(q): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<PriceBar>> {
    let period = q.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let interval = q.interval.as_deref().unwrap_or(DEFAULT_INTERVAL);
    Json(state.market.get_history(&symbol, period, interval).await)
}

async fn get_sectors(State(state): State<Arc<AppState>>) -> Json<Vec<SectorPerformance>> {
    Json(state.market.get_sector_performance().await)
}

#[derive(Deserialize)]
struct NewsQuery {
    symbol: Option<String>,
}

async fn get_news(
    Query(q): Query<NewsQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<NewsItem>> {
    Json(state.market.get_news(q.symbol.as_deref()).await)
}

async fn get_recommendation(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<TradeRecommendation> {
    Json(state.market.get_trade_recommendation(&symbol).await)
}

async fn get_options_recommendation(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<OptionsRecommendation> {
    Json(state.market.get_options_recommendation(&symbol).await)
}

#[derive(Serialize)]
struct ExpirationsResponse {
    symbol: String,
    expirations: Vec<NaiveDate>,
}

async fn get_option_expirations(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<ExpirationsResponse> {
    let expirations = state.market.get_option_expirations(&symbol).await;
    Json(ExpirationsResponse {
        symbol: symbol.trim().to_uppercase(),
        expirations,
    })
}

#[derive(Deserialize)]
struct OptionChainQuery {
    expiration: Option<NaiveDate>,
    limit: Option<usize>,
}

async fn get_option_chain(
    Path(symbol): Path<String>,
    Query(q): Query<OptionChainQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<OptionChain> {
    Json(
        state
            .market
            .get_option_chain(&symbol, q.expiration, q.limit)
            .await,
    )
}

#[derive(Deserialize)]
struct ChainLookupQuery {
    symbol: String,
    expiry: Option<NaiveDate>,
    limit: Option<usize>,
}

/// Query-string form of [`get_option_chain`] used by the options dashboard.
async fn lookup_option_chain(
    Query(q): Query<ChainLookupQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<OptionChain> {
    Json(
        state
            .market
            .get_option_chain(&q.symbol, q.expiry, q.limit)
            .await,
    )
}

pub fn options_router() -> Router<Arc<AppState>> {
    Router::new().route("/chain", get(lookup_option_chain))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote/{symbol}", get(get_quote))
        .route("/info/{symbol}", get(get_company_info))
        .route("/history/{symbol}", get(get_history))
        .route("/sectors", get(get_sectors))
        .route("/news", get(get_news))
        .route("/recommendation/{symbol}", get(get_recommendation))
        .route(
            "/options_recommendation/{symbol}",
            get(get_options_recommendation),
        )
        .route(
            "/options/expirations/{symbol}",
            get(get_option_expirations),
        )
        .route("/options/{symbol}", get(get_option_chain))
}
