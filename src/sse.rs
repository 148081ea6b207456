use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures_util::{Stream, StreamExt};

use crate::core::entities::StreamEvent;

/// One `data: <json>` frame per event. No keep-alive comments, so every line
/// a client reads is a JSON event.
pub fn to_axum_sse<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let mapped = stream.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode stream event");
            r#"{"type":"content","content":""}"#.to_string()
        });
        Ok(Event::default().data(json))
    });
    Sse::new(mapped)
}
