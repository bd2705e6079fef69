//! LLM streaming proxy
//!
//! Passes the client's JSON body straight through to the configured
//! generative endpoint with the server-side API key injected, and streams
//! the upstream response back verbatim. No request or response schema is
//! interpreted here.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};

use crate::AppState;
use doclens_common::{
    errors::{AppError, Result},
    identity::Identity,
    metrics,
};

/// Proxy a streaming generation request
pub async fn generate(
    State(state): State<AppState>,
    _caller: Identity,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Response> {
    let Some(ref api_key) = state.config.llm.api_key else {
        metrics::record_llm_request("unconfigured");
        return Err(AppError::Configuration {
            message: "LLM API key not configured".to_string(),
        });
    };

    let url = format!(
        "{}/models/{}:streamGenerateContent?alt=sse",
        state.config.llm.api_base.trim_end_matches('/'),
        model
    );

    let upstream = state
        .http
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-goog-api-key", api_key)
        .body(body)
        .send()
        .await
        .inspect_err(|e| {
            metrics::record_llm_request("upstream_error");
            tracing::error!(model = %model, error = %e, "LLM upstream request failed");
        })?;

    metrics::record_llm_request("ok");

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/event-stream")
        .to_string();

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal {
            message: format!("Failed to build proxy response: {}", e),
        })
}
