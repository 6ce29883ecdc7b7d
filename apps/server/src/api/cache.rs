use std::sync::Arc;

use alphasphere_market_data::CacheStatus;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Run a cache admin call on the blocking pool; both touch the snapshot file.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("Cache task failed: {}", e)))
}

async fn get_cache_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStatus>> {
    let status = blocking(&state, |s| s.market.cache_status()).await?;
    Ok(Json(status))
}

#[derive(Serialize)]
struct ClearCacheResponse {
    cleared: usize,
    status: CacheStatus,
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> ApiResult<Json<ClearCacheResponse>> {
    let (cleared, status) = blocking(&state, |s| {
        let cleared = s.market.clear_cache();
        (cleared, s.market.cache_status())
    })
    .await?;
    tracing::info!("Cache cleared ({} entries)", cleared);
    Ok(Json(ClearCacheResponse { cleared, status }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_cache_status))
        .route("/clear", post(clear_cache))
}
