//! Vision capability heuristics.
//!
//! Best-effort string matching over model identifiers, not an authoritative
//! registry. A false negative blocks video attachments for a model that could
//! take them; a false positive only suppresses the image warning. Each
//! provider family is its own strategy so entries can be revised as new
//! models ship without touching the others.

use std::sync::Arc;

pub trait VisionClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    /// `model` is already lowercased.
    fn supports_vision(&self, model: &str) -> bool;
}

/// Explicit capability words in the identifier.
pub struct KeywordMarkers;

impl VisionClassifier for KeywordMarkers {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn supports_vision(&self, model: &str) -> bool {
        if ["vision", "multimodal", "visual", "omni"]
            .iter()
            .any(|k| model.contains(k))
        {
            return true;
        }
        // "vl" only counts as a whole token, optionally with a version suffix ("internvl2").
        tokens(model).any(|t| t.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.').ends_with("vl"))
    }
}

pub struct OpenAiFamily;

impl VisionClassifier for OpenAiFamily {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn supports_vision(&self, model: &str) -> bool {
        const VISION: &[&str] = &[
            "gpt-4o", "gpt-4.1", "gpt-4-turbo", "gpt-4.5", "gpt-5", "chatgpt-4o", "o1", "o3", "o4",
        ];
        // Text-only members of otherwise multimodal lines.
        const TEXT_ONLY: &[&str] = &["o1-mini", "o1-preview", "o3-mini", "gpt-4o-audio", "gpt-4o-realtime"];
        let base = model.rsplit('/').next().unwrap_or(model);
        VISION.iter().any(|p| base.starts_with(p)) && !TEXT_ONLY.iter().any(|p| base.starts_with(p))
    }
}

pub struct AnthropicFamily;

impl VisionClassifier for AnthropicFamily {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn supports_vision(&self, model: &str) -> bool {
        ["claude-3", "claude-sonnet-4", "claude-opus-4", "claude-haiku-4"]
            .iter()
            .any(|p| model.contains(p))
    }
}

pub struct GoogleFamily;

impl VisionClassifier for GoogleFamily {
    fn name(&self) -> &'static str {
        "google"
    }

    fn supports_vision(&self, model: &str) -> bool {
        model.contains("gemini") || model.contains("gemma-3")
    }
}

/// Open-weight families commonly served behind OpenAI-compatible APIs.
pub struct OpenWeightFamily;

impl VisionClassifier for OpenWeightFamily {
    fn name(&self) -> &'static str {
        "open-weight"
    }

    fn supports_vision(&self, model: &str) -> bool {
        const FAMILIES: &[&str] = &[
            "llava",
            "pixtral",
            "llama-4",
            "llama4",
            "llama-3.2-11b",
            "llama-3.2-90b",
            "minicpm-v",
            "molmo",
            "idefics",
            "qvq",
            "cogvlm",
        ];
        FAMILIES.iter().any(|f| model.contains(f))
    }
}

fn tokens(model: &str) -> impl Iterator<Item = &str> {
    model
        .split(|c: char| matches!(c, '-' | '_' | '.' | '/' | ':'))
        .filter(|t| !t.is_empty())
}

/// Any-of composition over the family strategies. Unknown identifiers are not capable.
#[derive(Clone)]
pub struct CapabilityClassifier {
    strategies: Vec<Arc<dyn VisionClassifier>>,
}

impl CapabilityClassifier {
    pub fn new(strategies: Vec<Arc<dyn VisionClassifier>>) -> Self {
        Self { strategies }
    }

    pub fn supports_vision(&self, model: &str) -> bool {
        let model = model.trim().to_ascii_lowercase();
        match self.strategies.iter().find(|s| s.supports_vision(&model)) {
            Some(s) => {
                tracing::trace!(model = %model, strategy = s.name(), "vision capable");
                true
            }
            None => false,
        }
    }
}

impl Default for CapabilityClassifier {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(KeywordMarkers),
            Arc::new(OpenAiFamily),
            Arc::new(AnthropicFamily),
            Arc::new(GoogleFamily),
            Arc::new(OpenWeightFamily),
        ])
    }
}
