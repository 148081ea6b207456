#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, Response};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use rawchat::config::AppConfig;
use rawchat::connectors::{ChunkStream, Connector, ConnectorError};
use rawchat::core::capability::CapabilityClassifier;
use rawchat::core::entities::{UpstreamChunk, UpstreamRequest};
use rawchat::ratelimit::InMemoryStore;
use rawchat::AppState;
use serde_json::Value;

/// Replays canned upstream calls in order and records what it was sent.
#[derive(Default)]
pub struct ScriptedUpstream {
    calls: Mutex<VecDeque<Vec<UpstreamChunk>>>,
    pub seen: Mutex<Vec<UpstreamRequest>>,
    pub models: Mutex<Option<Value>>,
}

impl ScriptedUpstream {
    pub fn new(calls: Vec<Vec<UpstreamChunk>>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(calls.into()),
            ..Default::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedUpstream {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_chat(&self, req: UpstreamRequest) -> Result<ChunkStream, ConnectorError> {
        self.seen.lock().unwrap().push(req);
        let chunks = self
            .calls
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConnectorError::Stream("no scripted call left".into()))?;
        Ok(futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn list_models(&self) -> Result<Value, ConnectorError> {
        self.models
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConnectorError::Status { status: 500, message: "no models".into() })
    }
}

pub fn delta(text: &str) -> UpstreamChunk {
    UpstreamChunk {
        text_delta: Some(text.into()),
        finish_reason: None,
    }
}

pub fn finish(reason: &str) -> UpstreamChunk {
    UpstreamChunk {
        text_delta: None,
        finish_reason: Some(reason.into()),
    }
}

pub fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.upstream.api_key = Some("sk-test-secret-123".into());
    cfg
}

pub fn state_with(cfg: AppConfig, upstream: Arc<ScriptedUpstream>) -> AppState {
    AppState::with_parts(
        cfg,
        upstream,
        CapabilityClassifier::default(),
        Arc::new(InMemoryStore::new()),
    )
}

pub fn chat_request(body: Value) -> Request<Body> {
    Request::post("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Decodes every `data:` line of an event-stream body.
pub fn sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("data line is JSON"))
        .collect()
}
