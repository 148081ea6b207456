use axum::{http::header, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::ApiError;

lazy_static! {
    /// Chat requests by outcome
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rawchat_requests_total",
        "Total number of chat requests processed",
        &["model", "status"]
    )
    .unwrap();

    /// Every upstream streaming call, continuation calls included
    pub static ref UPSTREAM_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rawchat_upstream_calls_total",
        "Total number of upstream completion calls",
        &["model"]
    )
    .unwrap();

    pub static ref CONTINUATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rawchat_continuations_total",
        "Continuation iterations by trigger",
        &["model", "trigger"]
    )
    .unwrap();

    /// Handler entry to terminal event
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "rawchat_request_duration_seconds",
        "Chat request duration in seconds",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();

    pub static ref ACTIVE_STREAMS: IntGauge =
        register_int_gauge!("rawchat_active_streams", "Number of open chat event streams").unwrap();

    pub static ref RATE_LIMIT_HITS: IntCounter = register_int_counter!(
        "rawchat_rate_limit_hits_total",
        "Total number of requests rejected by the rate limiter"
    )
    .unwrap();
}

/// `model` label for requests rejected before the id was accepted.
pub const INVALID_MODEL_LABEL: &str = "invalid";
/// `model` label for accepted ids outside [`MODEL_FAMILIES`].
pub const OTHER_MODEL_LABEL: &str = "other";

/// Family prefixes allowed as `model` label values. The label set stays fixed
/// whatever ids clients send.
pub const MODEL_FAMILIES: &[&str] = &[
    "chatgpt", "gpt", "o1", "o3", "o4", "claude", "gemini", "gemma", "llama", "qwen", "qwq",
    "mistral", "mixtral", "pixtral", "deepseek", "hermes", "phi", "llava", "command",
];

pub fn model_label(model: &str) -> &'static str {
    let base = model.rsplit('/').next().unwrap_or(model);
    MODEL_FAMILIES
        .iter()
        .copied()
        .find(|family| {
            base.get(..family.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(family))
        })
        .unwrap_or(OTHER_MODEL_LABEL)
}

/// Decrements [`ACTIVE_STREAMS`] when the owning stream is dropped, including on client disconnect.
pub struct StreamGuard;

impl StreamGuard {
    pub fn new() -> Self {
        ACTIVE_STREAMS.inc();
        StreamGuard
    }
}

impl Default for StreamGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        ACTIVE_STREAMS.dec();
    }
}

/// Text exposition of the default registry.
pub fn render() -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::Internal(format!("metrics encoding failed: {e}")))?;
    String::from_utf8(buffer).map_err(|e| ApiError::Internal(e.to_string()))
}

/// `GET /metrics`
pub async fn metrics_handler() -> Result<impl IntoResponse, ApiError> {
    let body = render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
