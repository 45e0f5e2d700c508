//! Response normalisation: recover the model's JSON text from the envelope.
//!
//! Two steps, both pure:
//!
//! 1. [`extract_model_text`] pulls `candidates[0].content.parts[0].text` out
//!    of the response envelope. Every hop is an optional lookup, so a
//!    missing candidate, a safety block, or an empty part all end as
//!    [`BillScanError::ExtractionEmpty`] rather than a panic.
//! 2. [`strip_code_fences`] removes a wrapping ```` ```json ```` fence the
//!    model adds despite being told not to.
//!
//! Nothing here repairs JSON. Text that is not valid after fence stripping
//! is passed on unchanged and rejected by the deserializer.

use crate::error::BillScanError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// JSON pointer to the generated text inside a Gemini response.
const TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Extract the generated text and strip any wrapping fence.
pub fn normalize_response(envelope: &str) -> Result<String, BillScanError> {
    let text = extract_model_text(envelope)?;
    debug!("Raw extracted text: {}", text);
    let cleaned = strip_code_fences(&text);
    debug!("Cleaned JSON for deserialization: {}", cleaned);
    Ok(cleaned.to_string())
}

/// Return the first candidate's first text part.
///
/// Fails with `ExtractionEmpty` when the text is absent or blank, carrying
/// the block/finish reason when the envelope gives one.
pub fn extract_model_text(envelope: &str) -> Result<String, BillScanError> {
    let value: Value =
        serde_json::from_str(envelope).map_err(|source| BillScanError::Deserialization {
            source,
            text: envelope.to_string(),
        })?;

    match value.pointer(TEXT_POINTER).and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => {
            let reason = empty_reason(&value);
            warn!(
                "Could not extract text from Gemini response (reason: {}). Raw response: {}",
                reason.as_deref().unwrap_or("none given"),
                envelope
            );
            Err(BillScanError::ExtractionEmpty { reason })
        }
    }
}

/// Why the model produced nothing, if the envelope says.
fn empty_reason(value: &Value) -> Option<String> {
    value
        .pointer("/promptFeedback/blockReason")
        .or_else(|| value.pointer("/candidates/0/finishReason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ── Fence stripping ──────────────────────────────────────────────────────────

static RE_OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?i:json)?").unwrap());

/// Remove a wrapping markdown code fence.
///
/// Pre: any text. Post: the trimmed text, minus an opening fence (three
/// backticks, optionally tagged `json`) and, when present, a closing fence.
/// Text that does not start with a fence comes back trimmed and otherwise
/// untouched, which makes the function idempotent on unfenced input.
pub fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(opening) = RE_OPENING_FENCE.find(trimmed) else {
        return trimmed;
    };

    let body = trimmed[opening.end()..].trim();
    match body.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    #[test]
    fn extracts_first_candidate_text() {
        let text = extract_model_text(&envelope("{\"vendor\":\"A\"}")).unwrap();
        assert_eq!(text, "{\"vendor\":\"A\"}");
    }

    #[test]
    fn missing_candidates_is_empty() {
        let err = extract_model_text("{}").unwrap_err();
        assert!(matches!(err, BillScanError::ExtractionEmpty { reason: None }));
    }

    #[test]
    fn blank_text_is_empty() {
        let err = extract_model_text(&envelope("  \n ")).unwrap_err();
        match err {
            BillScanError::ExtractionEmpty { reason } => assert_eq!(reason.as_deref(), Some("STOP")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
        match extract_model_text(&body).unwrap_err() {
            BillScanError::ExtractionEmpty { reason } => assert_eq!(reason.as_deref(), Some("SAFETY")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_string_text_is_empty() {
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": 42 }] } }] }).to_string();
        assert!(matches!(
            extract_model_text(&body).unwrap_err(),
            BillScanError::ExtractionEmpty { .. }
        ));
    }

    #[test]
    fn non_json_envelope_is_deserialization_error() {
        let err = extract_model_text("<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, BillScanError::Deserialization { .. }));
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fences("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn strips_uppercase_tag() {
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn opening_fence_without_closing() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn unfenced_text_only_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(
            strip_code_fences("Here you go: {\"a\":1}"),
            "Here you go: {\"a\":1}"
        );
    }

    #[test]
    fn stripping_is_idempotent_on_unfenced_text() {
        for input in ["{\"a\":1}", "  {}  ", "not json", "", "{\"x\":\"```\"}"] {
            let once = strip_code_fences(input);
            assert_eq!(strip_code_fences(once), once, "input: {input:?}");
        }
    }

    #[test]
    fn normalize_response_full_path() {
        let text = "```json\n{\"vendor\":\"Cafe X\",\"totalAmount\":12.5}\n```";
        let cleaned = normalize_response(&envelope(text)).unwrap();
        assert_eq!(cleaned, "{\"vendor\":\"Cafe X\",\"totalAmount\":12.5}");
    }
}
