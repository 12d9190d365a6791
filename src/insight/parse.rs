//! Validation of untyped LLM replies.
//!
//! The generate endpoint returns a Gemini-style envelope
//! (`candidates[0].content.parts[0].text`) whose text *should* be a JSON
//! insight object, possibly inside a markdown code fence. Nothing about that
//! is trusted: every step that does not match the expected shape yields
//! [`InsightState::Unavailable`] instead of an error.

use serde_json::Value;

use super::data::{InsightData, InsightState};

/// Strip a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// ```
/// use documind::insight::parse::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
/// ```
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Text of the first candidate in a generate response.
pub fn candidate_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

/// Parse model output into [`InsightData`].
///
/// Accepts either `{"text": {…insight…}}` or the bare insight object. The
/// object must carry at least one of the known keys and every known key must
/// have the expected type.
pub fn parse_insight(text: &str) -> Option<InsightData> {
    let Value::Object(mut outer) = serde_json::from_str::<Value>(strip_code_fence(text)).ok()? else {
        return None;
    };
    let map = match outer.remove("text") {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            outer.insert("text".into(), other);
            outer
        }
        None => outer,
    };

    if !InsightData::FIELDS.iter().any(|key| map.contains_key(*key)) {
        return None;
    }
    serde_json::from_value(Value::Object(map)).ok()
}

/// Turn a raw generate response into the state shown by the insight panel.
pub fn interpret(payload: &Value) -> InsightState {
    let Some(text) = candidate_text(payload) else {
        log::warn!("insight: generate response has no candidate text");
        return InsightState::Unavailable;
    };
    match parse_insight(text) {
        Some(data) => InsightState::Ready(data),
        None => {
            log::warn!("insight: model output is not a valid insight object");
            InsightState::Unavailable
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
