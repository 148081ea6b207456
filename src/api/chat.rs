use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::core::completion::{CompletionLoop, LoopSettings};
use crate::core::entities::ChatRequest;
use crate::core::{history, validate};
use crate::error::ApiError;
use crate::{metrics, routing::AppState, sse};

/// `POST /api/chat`: validates, builds history, opens the first upstream call,
/// then streams `content` events followed by one `complete` event.
pub async fn chat(
    State(app): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    match start(&app, payload).await {
        Ok(lp) => sse::to_axum_sse(lp.into_stream()).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn start(
    app: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<CompletionLoop, ApiError> {
    let Json(mut req) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Request body too large".into())
        } else {
            ApiError::Validation(rejection.body_text())
        }
    })?;

    let cfg = app.config();
    let prepared = validate::validate(&mut req, cfg.chat.max_prompt_chars)
        .and_then(|()| history::build_messages(&req, app.classifier()));
    let messages = match prepared {
        Ok(messages) => messages,
        Err(e) => {
            metrics::REQUESTS_TOTAL
                .with_label_values(&[metrics::INVALID_MODEL_LABEL, "rejected"])
                .inc();
            return Err(e);
        }
    };

    let conversation_id = req
        .conversation_id
        .take()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::debug!(
        model = %req.model,
        conversation_id = %conversation_id,
        prompt_chars = req.prompt.chars().count(),
        history = req.messages.as_ref().map_or(0, Vec::len),
        images = req.images.as_ref().map_or(0, Vec::len),
        videos = req.videos.as_ref().map_or(0, Vec::len),
        audios = req.audios.as_ref().map_or(0, Vec::len),
        continuation = req.is_continuation(),
        "chat request"
    );

    let is_continuation = req.is_continuation();
    CompletionLoop::start(
        app.connector(),
        LoopSettings::from(&cfg.chat),
        req.model,
        conversation_id,
        is_continuation,
        messages,
    )
    .await
}
