use std::sync::Arc;

use alphasphere_market_data::{AnalysisRequest, MarketAnalysis, MarketDataError};
use axum::{extract::State, routing::post, Json, Router};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Json<MarketAnalysis>> {
    match state.market.analyze_market(&request) {
        Ok(analysis) => Ok(Json(analysis)),
        Err(MarketDataError::InvalidKey(message)) => Err(ApiError::BadRequest(message)),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/analyze", post(analyze))
}
