//! Pulls a JSON payload out of free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("invalid fenced block regex")
});

/// Decode `T` from model output that may wrap the JSON in code fences or prose.
///
/// Tries, in order: the whole text, every fenced block, then the span between
/// the first `{` and the last `}`.
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("model returned an empty response".to_string());
    }

    let mut last_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(err) => err.to_string(),
    };

    for captures in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            match serde_json::from_str::<T>(body.as_str().trim()) {
                Ok(value) => return Ok(value),
                Err(err) => last_error = err.to_string(),
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            match serde_json::from_str::<T>(&trimmed[start..=end]) {
                Ok(value) => return Ok(value),
                Err(err) => last_error = err.to_string(),
            }
        }
    }

    Err(format!("no JSON object found in model output: {last_error}"))
}
