use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::{future, StreamExt};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::json;

use crate::config::UpstreamConfig;
use crate::connectors::{ChunkStream, Connector, ConnectorError};
use crate::core::entities::{UpstreamChunk, UpstreamRequest};

/// Streaming client for any `/chat/completions` endpoint speaking the OpenAI wire format.
pub struct OpenAiConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiConnector {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()
            .map_err(|e| ConnectorError::Connect(e.to_string()))?;

        let api_key = cfg.api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("upstream API key not configured; chat requests will fail");
        } else {
            tracing::info!(base_url = %cfg.base_url, "upstream connector initialized");
        }

        Ok(Self {
            client,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key(&self) -> Result<&str, ConnectorError> {
        self.api_key
            .as_deref()
            .ok_or(ConnectorError::MissingCredentials)
    }
}

#[async_trait::async_trait]
impl Connector for OpenAiConnector {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn stream_chat(&self, req: UpstreamRequest) -> Result<ChunkStream, ConnectorError> {
        let key = self.key()?;
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": req.model,
            "messages": req.messages,
            "stream": true,
        });
        if let Some(t) = req.max_tokens {
            body["max_tokens"] = json!(t);
        }
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_event_data(&event.data).transpose(),
                    Err(e) => Some(Err(ConnectorError::Stream(e.to_string()))),
                })
            });

        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<serde_json::Value, ConnectorError> {
        let key = self.key()?;
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(key)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("AI API request failed")
                .to_owned()
        });
    Err(ConnectorError::Status {
        status: status.as_u16(),
        message,
    })
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamFailure>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamFailure {
    #[serde(default)]
    message: Option<String>,
}

/// Decodes one `data:` payload. `[DONE]` and keep-alive frames yield `None`.
pub(crate) fn parse_event_data(data: &str) -> Result<Option<UpstreamChunk>, ConnectorError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    let payload: StreamPayload =
        serde_json::from_str(data).map_err(|e| ConnectorError::Decode(e.to_string()))?;
    if let Some(err) = payload.error {
        return Err(ConnectorError::Stream(
            err.message.unwrap_or_else(|| "upstream reported an error".into()),
        ));
    }
    let Some(choice) = payload.choices.into_iter().next() else {
        return Ok(None);
    };
    let text_delta = choice
        .delta
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty());
    if text_delta.is_none() && choice.finish_reason.is_none() {
        return Ok(None);
    }
    Ok(Some(UpstreamChunk {
        text_delta,
        finish_reason: choice.finish_reason,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::UpstreamMessage;

    fn config(base_url: String, api_key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            api_key: api_key.map(str::to_owned),
            base_url,
            ..Default::default()
        }
    }

    fn request() -> UpstreamRequest {
        UpstreamRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![UpstreamMessage::user("Hello")],
            max_tokens: Some(16),
            temperature: Some(0.7),
        }
    }

    #[test]
    fn parses_deltas_and_finish_reason() {
        let c = parse_event_data(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(c.text_delta.as_deref(), Some("Hi"));
        assert!(c.finish_reason.is_none());

        let end = parse_event_data(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(end.finish_reason.as_deref(), Some("length"));
        assert!(end.text_delta.is_none());
    }

    #[test]
    fn skips_done_and_empty_frames() {
        assert!(parse_event_data("[DONE]").unwrap().is_none());
        assert!(parse_event_data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)
            .unwrap()
            .is_none());
        assert!(parse_event_data(r#"{"choices":[]}"#).unwrap().is_none());
    }

    #[test]
    fn in_band_errors_surface() {
        let err = parse_event_data(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(err.to_string().contains("overloaded"));
        assert!(matches!(parse_event_data("{not json"), Err(ConnectorError::Decode(_))));
    }

    #[tokio::test]
    async fn streams_sse_body() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "max_tokens": 16
            })))
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let connector = OpenAiConnector::new(&config(server.url(), Some("sk-test"))).unwrap();
        let chunks: Vec<UpstreamChunk> = connector
            .stream_chat(request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        mock.assert_async().await;
        let text: String = chunks.iter().filter_map(|c| c.text_delta.clone()).collect();
        assert_eq!(text, "Hello");
        assert_eq!(chunks.last().unwrap().finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn error_status_carries_provider_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid API key"}}"#)
            .create_async()
            .await;

        let connector = OpenAiConnector::new(&config(server.url(), Some("bad"))).unwrap();
        match connector.stream_chat(request()).await {
            Err(ConnectorError::Status { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_upstream() {
        let connector = OpenAiConnector::new(&config("http://127.0.0.1:9".into(), None)).unwrap();
        assert!(matches!(
            connector.stream_chat(request()).await,
            Err(ConnectorError::MissingCredentials)
        ));
        assert!(matches!(
            connector.list_models().await,
            Err(ConnectorError::MissingCredentials)
        ));
    }
}
