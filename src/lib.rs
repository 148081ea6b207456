//! Streaming chat gateway for OpenAI-compatible providers.
//!
//! `POST /api/chat` turns client-held conversation state into an upstream
//! history, streams the answer back as `data:` events, and transparently
//! re-invokes the provider when the answer is cut short.

pub mod api;
pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod observability;
pub mod ratelimit;
pub mod routing;
pub mod sse;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

pub use config::AppConfig;
pub use routing::AppState;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Full application router: `/api/*`, health and metrics.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config().server.max_body_bytes;

    let mut api = Router::new()
        .route("/chat", post(api::chat::chat))
        .route("/models", get(api::models::list_models))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(middleware::from_fn_with_state(max_body, guard::request_guard));
    if state.config().rate_limit.enabled {
        api = api.layer(middleware::from_fn_with_state(
            state.limiter(),
            ratelimit::rate_limit_middleware,
        ));
    }
    let api = api.layer(cors());

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
}
