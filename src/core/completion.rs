//! Streaming completion loop.
//!
//! One logical answer may take several upstream calls. The loop streams each
//! call's deltas to the client as they arrive, then checks the two truncation
//! signals (a `length` finish reason or a trailing [`sentinel::SENTINEL`]).
//! On truncation it appends the partial reply and a continue request to the
//! history and calls again; otherwise it emits the terminal `complete` event.
//!
//! ```text
//! Calling -> Streaming -> Deciding -> Done
//!    ^                       |
//!    +------- (truncated) ---+
//! ```
//!
//! Iterations are strictly sequential. The number of continuation calls is
//! capped, and every call plus the loop as a whole run against deadlines.
//! Dropping the stream (client disconnect) drops the in-flight upstream call.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::{timeout_at, Instant};

use crate::config::ChatConfig;
use crate::connectors::{ChunkStream, Connector, ConnectorError};
use crate::core::entities::{CompletePayload, StreamEvent, UpstreamMessage, UpstreamRequest};
use crate::core::{fence, sentinel};
use crate::error::ApiError;
use crate::metrics;

#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub max_continuations: u32,
    pub call_timeout: Duration,
    pub total_timeout: Duration,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl From<&ChatConfig> for LoopSettings {
    fn from(cfg: &ChatConfig) -> Self {
        Self {
            max_continuations: cfg.max_continuations,
            call_timeout: cfg.call_timeout(),
            total_timeout: cfg.total_timeout(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

enum Phase {
    Calling,
    Streaming(ChunkStream),
    Deciding,
    Done,
}

enum Outcome {
    Finished,
    GaveUp,
    Failed(ConnectorError),
}

pub struct CompletionLoop {
    connector: Arc<dyn Connector>,
    settings: LoopSettings,
    model: String,
    /// Bounded `model` label for metrics.
    label: &'static str,
    conversation_id: String,
    is_continuation: bool,
    messages: Vec<UpstreamMessage>,
    phase: Phase,
    /// Visible text of the current upstream call.
    segment: String,
    /// Visible text across all calls so far.
    accumulated: String,
    finish_reason: Option<String>,
    calls: u32,
    continuations: u32,
    started: Instant,
    call_deadline: Instant,
    total_deadline: Instant,
    _guard: metrics::StreamGuard,
}

impl CompletionLoop {
    /// Opens the first upstream call. Failures here are reported as a plain
    /// HTTP error since no event has been sent yet.
    pub async fn start(
        connector: Arc<dyn Connector>,
        settings: LoopSettings,
        model: String,
        conversation_id: String,
        is_continuation: bool,
        messages: Vec<UpstreamMessage>,
    ) -> Result<Self, ApiError> {
        let started = Instant::now();
        let total_deadline = started + settings.total_timeout;
        let mut this = Self {
            connector,
            settings,
            label: metrics::model_label(&model),
            model,
            conversation_id,
            is_continuation,
            messages,
            phase: Phase::Calling,
            segment: String::new(),
            accumulated: String::new(),
            finish_reason: None,
            calls: 0,
            continuations: 0,
            started,
            call_deadline: total_deadline,
            total_deadline,
            _guard: metrics::StreamGuard::new(),
        };
        match this.open().await {
            Ok(stream) => {
                this.phase = Phase::Streaming(stream);
                Ok(this)
            }
            Err(e) => {
                tracing::error!(model = %this.model, error = %e, "upstream call failed");
                this.record("error");
                Err(e.into())
            }
        }
    }

    async fn open(&mut self) -> Result<ChunkStream, ConnectorError> {
        let now = Instant::now();
        if now >= self.total_deadline {
            return Err(ConnectorError::Timeout);
        }
        self.call_deadline = (now + self.settings.call_timeout).min(self.total_deadline);
        self.calls += 1;
        metrics::UPSTREAM_CALLS_TOTAL
            .with_label_values(&[self.label])
            .inc();
        tracing::info!(
            model = %self.model,
            conversation_id = %self.conversation_id,
            call = self.calls,
            messages = self.messages.len(),
            "starting upstream call"
        );
        let req = UpstreamRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        match timeout_at(self.call_deadline, self.connector.stream_chat(req)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectorError::Timeout),
        }
    }

    /// Advances the state machine to the next outbound event.
    /// Returns `None` once the `complete` event has been produced.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::Calling => match self.open().await {
                    Ok(stream) => self.phase = Phase::Streaming(stream),
                    Err(e) => return Some(self.finish(Outcome::Failed(e))),
                },
                Phase::Streaming(mut stream) => {
                    match timeout_at(self.call_deadline, stream.next()).await {
                        Ok(Some(Ok(chunk))) => {
                            // A finish reason ends the call even if the provider
                            // keeps the connection open for trailing frames.
                            self.phase = match chunk.finish_reason {
                                Some(reason) => {
                                    self.finish_reason = Some(reason);
                                    Phase::Deciding
                                }
                                None => Phase::Streaming(stream),
                            };
                            if let Some(delta) = chunk.text_delta.filter(|d| !d.is_empty()) {
                                self.segment.push_str(&delta);
                                self.accumulated.push_str(&delta);
                                return Some(StreamEvent::Content { content: delta });
                            }
                        }
                        Ok(Some(Err(e))) => return Some(self.finish(Outcome::Failed(e))),
                        Ok(None) => self.phase = Phase::Deciding,
                        Err(_) => return Some(self.finish(Outcome::Failed(ConnectorError::Timeout))),
                    }
                }
                Phase::Deciding => {
                    let Some(trigger) =
                        sentinel::detect(self.finish_reason.as_deref(), &self.segment)
                    else {
                        return Some(self.finish(Outcome::Finished));
                    };
                    sentinel::strip_trailing(&mut self.segment);
                    sentinel::strip_trailing(&mut self.accumulated);
                    if self.continuations >= self.settings.max_continuations {
                        tracing::warn!(
                            model = %self.model,
                            conversation_id = %self.conversation_id,
                            continuations = self.continuations,
                            "continuation limit reached, returning partial answer"
                        );
                        return Some(self.finish(Outcome::GaveUp));
                    }
                    self.continuations += 1;
                    metrics::CONTINUATIONS_TOTAL
                        .with_label_values(&[self.label, trigger.as_str()])
                        .inc();
                    tracing::info!(
                        model = %self.model,
                        conversation_id = %self.conversation_id,
                        trigger = trigger.as_str(),
                        continuation = self.continuations,
                        "answer truncated, continuing"
                    );
                    let partial = std::mem::take(&mut self.segment);
                    self.messages.push(UpstreamMessage::assistant(partial));
                    self.messages
                        .push(UpstreamMessage::user(sentinel::CONTINUE_REQUEST));
                    self.finish_reason = None;
                    self.phase = Phase::Calling;
                }
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> StreamEvent {
        self.phase = Phase::Done;
        let (finish_reason, truncated, error, status) = match outcome {
            Outcome::Finished => (self.finish_reason.take(), false, None, "ok"),
            Outcome::GaveUp => (self.finish_reason.take(), true, None, "truncated"),
            Outcome::Failed(e) => {
                tracing::error!(
                    model = %self.model,
                    conversation_id = %self.conversation_id,
                    call = self.calls,
                    error = %e,
                    "upstream stream aborted"
                );
                let reason = match e {
                    ConnectorError::Timeout => "timeout",
                    _ => "error",
                };
                (Some(reason.to_owned()), false, Some(e.to_string()), "error")
            }
        };
        self.record(status);
        tracing::info!(
            model = %self.model,
            conversation_id = %self.conversation_id,
            calls = self.calls,
            finish_reason = finish_reason.as_deref().unwrap_or("none"),
            chars = self.accumulated.len(),
            "completion finished"
        );

        StreamEvent::Complete(CompletePayload {
            needs_continuation: self.continuations > 0 && !self.is_continuation,
            is_continuation: self.is_continuation,
            conversation_id: self.conversation_id.clone(),
            model: self.model.clone(),
            finish_reason,
            final_content: fence::wrap(&sentinel::scrub(&self.accumulated)),
            truncated,
            error,
        })
    }

    fn record(&self, status: &str) {
        metrics::REQUESTS_TOTAL
            .with_label_values(&[self.label, status])
            .inc();
        metrics::REQUEST_DURATION
            .with_label_values(&[self.label])
            .observe(self.started.elapsed().as_secs_f64());
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        futures_util::stream::unfold(self, |mut driver| async move {
            driver.next_event().await.map(|event| (event, driver))
        })
    }
}
