//! Boundary checks run before any history is built or upstream call made.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::entities::ChatRequest;
use crate::error::ApiError;

lazy_static! {
    static ref MODEL_ID: Regex = Regex::new(r"^[a-zA-Z0-9\-_./]+$").unwrap();
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap();
    static ref SCRIPT_TAG: Regex = Regex::new(r"(?i)</?script\b[^>]*>").unwrap();
}

/// Best-effort removal of `<script>` blocks and stray script tags.
/// Output-side sanitization is still the renderer's job.
pub fn strip_script_tags(input: &str) -> String {
    let without_blocks = SCRIPT_BLOCK.replace_all(input, "");
    SCRIPT_TAG.replace_all(&without_blocks, "").into_owned()
}

/// Checks prompt and model, trimming the model and sanitizing the prompt in place.
pub fn validate(req: &mut ChatRequest, max_prompt_chars: usize) -> Result<(), ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::Validation("Missing prompt".into()));
    }
    let model = req.model.trim();
    if model.is_empty() {
        return Err(ApiError::Validation("Missing model".into()));
    }
    if !MODEL_ID.is_match(model) {
        return Err(ApiError::Validation(format!("Invalid model identifier '{model}'")));
    }
    req.model = model.to_owned();

    let chars = req.prompt.chars().count();
    if chars > max_prompt_chars {
        return Err(ApiError::Validation(format!(
            "Prompt too long ({chars} characters); maximum is {max_prompt_chars}"
        )));
    }

    let cleaned = strip_script_tags(&req.prompt);
    if cleaned.trim().is_empty() {
        return Err(ApiError::Validation("Missing prompt".into()));
    }
    req.prompt = cleaned;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, model: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_and_trims_model() {
        let mut req = request("Hello", "  openai/gpt-4o-mini ");
        validate(&mut req, 100).unwrap();
        assert_eq!(req.model, "openai/gpt-4o-mini");
        assert_eq!(req.prompt, "Hello");
    }

    #[test]
    fn rejects_missing_fields() {
        let err = validate(&mut request("   ", "gpt-4o"), 100).unwrap_err();
        assert_eq!(err.to_string(), "Missing prompt");
        let err = validate(&mut request("hi", ""), 100).unwrap_err();
        assert_eq!(err.to_string(), "Missing model");
    }

    #[test]
    fn rejects_bad_model_characters() {
        for model in ["gpt 4o", "gpt-4o;rm", "mödel", "a?b"] {
            assert!(matches!(
                validate(&mut request("hi", model), 100),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_oversized_prompt() {
        let long = "x".repeat(11);
        assert!(validate(&mut request(&long, "m"), 10).is_err());
        assert!(validate(&mut request(&"é".repeat(10), "m"), 10).is_ok());
    }

    #[test]
    fn strips_script_tags() {
        assert_eq!(
            strip_script_tags("a<script>alert(1)</script>b<SCRIPT src=x>c"),
            "abc"
        );
        let mut req = request("<script>alert(1)</script>", "m");
        assert!(validate(&mut req, 100).is_err());
    }
}
