//! In-band truncation marker.
//!
//! The model is told to end its visible output with [`SENTINEL`] whenever it
//! has to stop before the answer is complete. Together with a `length` finish
//! reason from the provider, this is one of two equivalent truncation signals.

/// Literal the model emits when it truncates its own answer.
pub const SENTINEL: &str = "[CONTINUE]";

/// Finish reason an OpenAI-compatible provider reports for a token-limited answer.
pub const LENGTH_FINISH_REASON: &str = "length";

/// User turn appended inside the loop after a truncated assistant reply.
pub const CONTINUE_REQUEST: &str =
    "Continue exactly where you left off. Do not repeat any text you have already written.";

/// Prompt text used instead of the user's prompt for a client-driven continuation request.
pub const CONTINUATION_DIRECTIVE: &str = "Please continue from where you left off.";

/// Fixed first system message describing the marker contract.
pub fn system_instruction() -> String {
    format!(
        "You are a helpful assistant. If your answer is too long to finish in one response, \
         stop at a natural break and end your output with the exact marker {SENTINEL} on its own. \
         Never emit {SENTINEL} when your answer is complete. When asked to continue, resume \
         exactly where you stopped without repeating earlier text."
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truncation {
    /// Provider stopped at its token limit.
    Length,
    /// Model ended its output with the marker.
    Sentinel,
}

impl Truncation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Truncation::Length => "length",
            Truncation::Sentinel => "sentinel",
        }
    }
}

pub fn ends_with_sentinel(text: &str) -> bool {
    text.trim_end().ends_with(SENTINEL)
}

/// Classifies the end of one upstream call. Length wins when both signals are present.
pub fn detect(finish_reason: Option<&str>, segment: &str) -> Option<Truncation> {
    if finish_reason == Some(LENGTH_FINISH_REASON) {
        Some(Truncation::Length)
    } else if ends_with_sentinel(segment) {
        Some(Truncation::Sentinel)
    } else {
        None
    }
}

/// Removes a trailing marker and any whitespace after it. Whatever precedes the
/// marker, separators included, is part of the answer and stays.
pub fn strip_trailing(text: &mut String) {
    if let Some(body) = text.trim_end().strip_suffix(SENTINEL) {
        let keep = body.len();
        text.truncate(keep);
    }
}

/// Drops every occurrence of the marker.
pub fn scrub(text: &str) -> String {
    if text.contains(SENTINEL) {
        text.replace(SENTINEL, "")
    } else {
        text.to_owned()
    }
}
