use serde::{Deserialize, Serialize};

/// Inbound body of `POST /api/chat`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub videos: Option<Vec<String>>,
    #[serde(default)]
    pub audios: Option<Vec<String>>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<HistoryTurn>>,
    #[serde(default)]
    pub is_continuation: Option<bool>,
    #[serde(default)]
    pub previous_content: Option<String>,
}

impl ChatRequest {
    pub fn is_continuation(&self) -> bool {
        self.is_continuation.unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A prior turn supplied by the client. The server keeps no conversation store.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub videos: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputAudio {
    pub data: String,
    pub format: String,
}

/// Upstream content part. Videos travel as `image_url`; there is no video part upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "input_audio")]
    InputAudio { input_audio: InputAudio },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl UpstreamMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Everything a connector needs for one streaming call.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One decoded delta from the provider's event stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpstreamChunk {
    pub text_delta: Option<String>,
    pub finish_reason: Option<String>,
}

/// Outbound events of the chat stream, one `data:` line each.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    Content { content: String },
    Complete(CompletePayload),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    pub needs_continuation: bool,
    pub is_continuation: bool,
    pub conversation_id: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub final_content: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_reads_camel_case_fields() {
        let req: ChatRequest = serde_json::from_value(json!({
            "prompt": "hi",
            "model": "gpt-4o",
            "conversationId": "c1",
            "systemPrompt": "be brief",
            "isContinuation": true,
            "previousContent": "abc",
            "messages": [{"role": "assistant", "content": "yo", "images": ["data:image/png;base64,AA=="]}]
        }))
        .unwrap();
        assert_eq!(req.conversation_id.as_deref(), Some("c1"));
        assert!(req.is_continuation());
        let turns = req.messages.unwrap();
        assert_eq!(turns[0].role, TurnRole::Assistant);
        assert_eq!(turns[0].images.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn content_parts_use_openai_shape() {
        let msg = UpstreamMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::text("look"),
                ContentPart::image_url("data:image/png;base64,AA=="),
            ]),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA=="}}
                ]
            })
        );
        let plain = UpstreamMessage::system("rules");
        assert_eq!(
            serde_json::to_value(&plain).unwrap(),
            json!({"role": "system", "content": "rules"})
        );
    }

    #[test]
    fn stream_events_serialize_with_type_tag() {
        let chunk = StreamEvent::Content { content: "to".into() };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({"type": "content", "content": "to"})
        );
        let done = StreamEvent::Complete(CompletePayload {
            needs_continuation: false,
            is_continuation: false,
            conversation_id: "c".into(),
            model: "m".into(),
            finish_reason: None,
            final_content: "x".into(),
            truncated: false,
            error: None,
        });
        let v = serde_json::to_value(&done).unwrap();
        assert_eq!(v["type"], "complete");
        assert_eq!(v["needsContinuation"], false);
        assert_eq!(v["finishReason"], serde_json::Value::Null);
        assert!(v.get("error").is_none());
    }
}
