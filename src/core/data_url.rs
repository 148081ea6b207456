use base64::Engine as _;

use crate::core::entities::InputAudio;
use crate::error::ApiError;

/// A parsed `data:<mime>;base64,<payload>` URL. Borrows from the input.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

impl<'a> DataUrl<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let rest = raw.trim().strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        if mime.is_empty() || !mime.contains('/') || payload.is_empty() {
            return None;
        }
        Some(Self { mime, payload })
    }

    pub fn decodes(&self) -> bool {
        base64::engine::general_purpose::STANDARD
            .decode(self.payload)
            .is_ok()
    }
}

/// Turns an audio data URL into the upstream `input_audio` payload.
pub fn audio_part(raw: &str) -> Result<InputAudio, ApiError> {
    let invalid = || ApiError::MalformedAttachment("Invalid data URL".into());
    let url = DataUrl::parse(raw).ok_or_else(invalid)?;
    let subtype = url.mime.strip_prefix("audio/").ok_or_else(invalid)?;
    if !url.decodes() {
        return Err(invalid());
    }
    let format = match subtype {
        "mpeg" | "mp3" => "mp3",
        "x-wav" | "wav" | "wave" => "wav",
        other => other,
    };
    Ok(InputAudio {
        data: url.payload.to_owned(),
        format: format.to_owned(),
    })
}
