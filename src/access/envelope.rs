//! Decoding of transcriber result payloads.
//!
//! Recognisers report results either as a JSON object carrying a `text`
//! (final) or `partial` (in progress) field, or as bare text.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed transcriber payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transcriber payload has neither a `text` nor a `partial` field")]
    MissingText,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    partial: Option<String>,
}

/// Extract the recognised text from a raw transcriber payload.
///
/// Returns `Ok(None)` for empty results.  The returned text is trimmed but not
/// otherwise normalised.
pub fn extract_text(raw: &str) -> Result<Option<String>, EnvelopeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let text = if trimmed.starts_with('{') {
        let envelope: Envelope = serde_json::from_str(trimmed)?;
        envelope
            .text
            .or(envelope.partial)
            .ok_or(EnvelopeError::MissingText)?
    } else {
        trimmed.to_string()
    };

    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
