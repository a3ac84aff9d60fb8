use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde_json::json;

use crate::config::get_config;
use crate::error::Result;
use crate::models::dispatch::{DispatchOutcome, EndpointCandidate};
use crate::utils::hash::response_cache_key;
use crate::AppState;

static PROXY_CACHE_HEADER: HeaderName = HeaderName::from_static("x-proxy-cache");

/// Forward-with-retry hop in front of the unreliable generation upstream.
/// Each configured target gets a bounded number of strictly timed attempts;
/// when every target fails, the last known-good response for this request is
/// served from the cache instead of an error.
pub async fn forward(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let config = get_config();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let cache_key = response_cache_key(&content_type, &body);
    let candidates = EndpointCandidate::expand(
        &config.proxy_targets,
        config.proxy_attempts,
        config.proxy_attempt_timeout(),
    );

    match state
        .dispatcher
        .forward_raw(&content_type, body, &candidates)
        .await
    {
        DispatchOutcome::Success { text, content_type } => {
            state
                .proxy_cache
                .store(cache_key, text.clone(), content_type);
            Ok((
                StatusCode::OK,
                [(PROXY_CACHE_HEADER.clone(), "miss".to_string())],
                Json(json!({ "questions": text })),
            )
                .into_response())
        }
        DispatchOutcome::Failure { reason } => {
            if let Some(cached) = state.proxy_cache.get(&cache_key) {
                tracing::warn!(%reason, "all targets failed, serving cached response");
                return Ok((
                    StatusCode::OK,
                    [(PROXY_CACHE_HEADER.clone(), "hit".to_string())],
                    Json(json!({ "questions": cached.text })),
                )
                    .into_response());
            }
            tracing::error!(%reason, "all targets failed with no cached fallback");
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Server busy, please try again." })),
            )
                .into_response())
        }
    }
}
