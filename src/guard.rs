use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Rejects POSTs that are not JSON or that declare a body over `max_body_bytes`,
/// before the body is read.
pub async fn request_guard(
    State(max_body_bytes): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::POST {
        let is_json = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return ApiError::Validation("Content-Type must be application/json".into())
                .into_response();
        }
    }

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Some(len) = declared.filter(|len| *len > max_body_bytes) {
        return ApiError::PayloadTooLarge(format!(
            "Request body too large ({len} bytes; max {max_body_bytes})"
        ))
        .into_response();
    }

    next.run(request).await
}
