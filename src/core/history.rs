//! Builds the ordered message list sent upstream.

use crate::core::capability::CapabilityClassifier;
use crate::core::data_url;
use crate::core::entities::{
    ChatRequest, ContentPart, HistoryTurn, MessageContent, Role, UpstreamMessage,
};
use crate::core::sentinel;
use crate::error::ApiError;

/// Number of most recent client-supplied turns kept as context. Older ones are dropped.
pub const MAX_CONTEXT_MESSAGES: usize = 10;

fn attachments<'a>(
    images: &'a Option<Vec<String>>,
    videos: &'a Option<Vec<String>>,
) -> impl Iterator<Item = &'a String> {
    images.iter().flatten().chain(videos.iter().flatten())
}

fn history_message(turn: &HistoryTurn) -> UpstreamMessage {
    let mut media = attachments(&turn.images, &turn.videos).peekable();
    let content = if media.peek().is_some() {
        let mut parts = vec![ContentPart::text(turn.content.as_str())];
        parts.extend(media.map(|url| ContentPart::image_url(url.as_str())));
        MessageContent::Parts(parts)
    } else {
        MessageContent::Text(turn.content.clone())
    };
    UpstreamMessage {
        role: turn.role.into(),
        content,
    }
}

/// Produces the full upstream history for `req`. Performs no I/O.
///
/// Videos on the new turn are a hard failure for models the classifier does
/// not consider vision capable; images only log a warning.
pub fn build_messages(
    req: &ChatRequest,
    classifier: &CapabilityClassifier,
) -> Result<Vec<UpstreamMessage>, ApiError> {
    let images = req.images.as_deref().unwrap_or_default();
    let videos = req.videos.as_deref().unwrap_or_default();
    let audios = req.audios.as_deref().unwrap_or_default();

    let vision = classifier.supports_vision(&req.model);
    if !videos.is_empty() && !vision {
        return Err(ApiError::AttachmentCapability {
            model: req.model.clone(),
        });
    }
    if !images.is_empty() && !vision {
        tracing::warn!(
            model = %req.model,
            images = images.len(),
            "sending images to a model not recognised as vision capable"
        );
    }

    let mut messages = vec![UpstreamMessage::system(sentinel::system_instruction())];

    if let Some(prompt) = req.system_prompt.as_deref().map(str::trim) {
        if !prompt.is_empty() {
            messages.push(UpstreamMessage::system(prompt));
        }
    }

    if let Some(turns) = req.messages.as_deref() {
        let start = turns.len().saturating_sub(MAX_CONTEXT_MESSAGES);
        messages.extend(turns[start..].iter().map(history_message));
    }

    let text = if req.is_continuation() && req.previous_content.is_some() {
        sentinel::CONTINUATION_DIRECTIVE.to_owned()
    } else {
        req.prompt.clone()
    };

    if images.is_empty() && videos.is_empty() && audios.is_empty() {
        messages.push(UpstreamMessage::user(text));
        return Ok(messages);
    }

    let mut parts = vec![ContentPart::Text { text }];
    parts.extend(
        images
            .iter()
            .chain(videos)
            .map(|url| ContentPart::image_url(url.trim())),
    );
    for raw in audios {
        parts.push(ContentPart::InputAudio {
            input_audio: data_url::audio_part(raw)?,
        });
    }
    messages.push(UpstreamMessage {
        role: Role::User,
        content: MessageContent::Parts(parts),
    });
    Ok(messages)
}
