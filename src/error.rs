use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::connectors::ConnectorError;

/// Every failure a request can end with before its event stream starts.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("model '{model}' does not support video input")]
    AttachmentCapability { model: String },
    #[error("{0}")]
    MalformedAttachment(String),
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    UpstreamRequest { status: u16, message: String },
    #[error("Unable to connect to AI service")]
    UpstreamConnectivity,
    #[error("AI service timed out")]
    UpstreamTimeout,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after: u64 },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::AttachmentCapability { .. }
            | ApiError::MalformedAttachment(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::UpstreamRequest { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::UpstreamConnectivity => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::PayloadTooLarge(_) => "validation_error",
            ApiError::AttachmentCapability { .. } => "attachment_capability_error",
            ApiError::MalformedAttachment(_) => "malformed_attachment_error",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::UpstreamRequest { .. } => "upstream_error",
            ApiError::UpstreamConnectivity | ApiError::UpstreamTimeout => "upstream_unavailable",
            ApiError::RateLimited { .. } => "rate_limit_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<ConnectorError> for ApiError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::MissingCredentials => ApiError::Configuration(
                "API key not configured. Please set API_KEY environment variable.".into(),
            ),
            ConnectorError::Status { status, message } => {
                ApiError::UpstreamRequest { status, message }
            }
            ConnectorError::Connect(_) => ApiError::UpstreamConnectivity,
            ConnectorError::Timeout => ApiError::UpstreamTimeout,
            ConnectorError::Stream(m) | ConnectorError::Decode(m) => ApiError::UpstreamRequest {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message: m,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status();
        if code.is_server_error() {
            tracing::error!(status = code.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = code.as_u16(), error = %self, "request rejected");
        }
        let mut error = serde_json::json!({
            "message": self.to_string(),
            "type": self.kind(),
        });
        if let ApiError::RateLimited { retry_after } = &self {
            error["retryAfter"] = serde_json::json!(retry_after);
        }
        let mut response = (code, Json(serde_json::json!({ "error": error }))).into_response();
        if let ApiError::RateLimited { retry_after } = self {
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, v);
            }
        }
        response
    }
}
