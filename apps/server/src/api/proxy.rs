//! Pass-through routes for the brokerage and chat APIs.
//!
//! Credentials stay on the server: requests are forwarded with the configured
//! keys attached and upstream responses are relayed with their status code.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const ALPACA_KEY_HEADER: &str = "APCA-API-KEY-ID";
const ALPACA_SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

async fn alpaca_proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    Path(endpoint): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Response> {
    let (Some(key_id), Some(secret)) = (&state.alpaca.key_id, &state.alpaca.secret_key) else {
        return Err(ApiError::Internal(
            "Alpaca API keys are not configured".to_string(),
        ));
    };

    let mut url = format!(
        "{}/{}",
        state.alpaca.base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&query);
    }
    tracing::debug!("Proxying {} {}", method, url);

    let mut request = state
        .http
        .request(method, &url)
        .header(ALPACA_KEY_HEADER, key_id)
        .header(ALPACA_SECRET_HEADER, secret);
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        request = request.header(header::CONTENT_TYPE, content_type.clone());
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let response = request.send().await.map_err(|e| {
        tracing::warn!("Alpaca request to {} failed: {}", url, e);
        ApiError::Unavailable(format!("Alpaca API unreachable: {}", e))
    })?;
    relay("Alpaca", response).await
}

async fn deepseek_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    let Some(api_key) = &state.deepseek.api_key else {
        return Err(ApiError::Internal(
            "DeepSeek API key is not configured".to_string(),
        ));
    };

    let url = format!(
        "{}/chat/completions",
        state.deepseek.base_url.trim_end_matches('/')
    );
    let response = state
        .http
        .post(&url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!("DeepSeek request failed: {}", e);
            ApiError::Unavailable(format!("DeepSeek API unreachable: {}", e))
        })?;
    relay("DeepSeek", response).await
}

/// Forward an upstream response, keeping its status.
///
/// JSON bodies are passed through as is. A non-JSON error body is wrapped in
/// `{error, details}`.
async fn relay(service: &str, response: reqwest::Response) -> ApiResult<Response> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| {
        ApiError::Unavailable(format!("{} response could not be read: {}", service, e))
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(body) => Ok((status, Json(body)).into_response()),
        Err(_) if status.is_success() => Ok((status, bytes).into_response()),
        Err(_) => {
            tracing::warn!("{} returned {} with a non-JSON body", service, status);
            let body = json!({
                "error": format!("{} request failed with status {}", service, status.as_u16()),
                "details": String::from_utf8_lossy(&bytes),
            });
            Ok((status, Json(body)).into_response())
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/alpaca/api/{*endpoint}",
            get(alpaca_proxy).post(alpaca_proxy),
        )
        .route("/api/deepseek/chat", post(deepseek_chat))
}
