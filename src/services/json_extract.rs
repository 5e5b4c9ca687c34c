use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n\s*```").expect("fence pattern"));

/// Pulls the JSON object out of a model reply. Models wrap it in markdown
/// fences or surround it with prose, so try the fence first and then the
/// outermost braces.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Some(inner) = caps.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(inner.as_str().trim()) {
                return Some(value);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end]).ok()
}

/// Typed variant of [`extract_json`]. Only JSON objects are accepted.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = extract_json(text)?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}
