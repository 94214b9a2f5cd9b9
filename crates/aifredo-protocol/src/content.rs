//! Content normalization.
//!
//! The gateway ships message content either as a single string or as
//! an ordered list of parts, where a part is a string or a map with a
//! `text` field. Both shapes normalize to one concatenated string; a
//! part without usable text contributes nothing.

use serde_json::Value;

/// Normalize a content value to a single string.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                Value::String(text) => text.as_str(),
                Value::Object(map) => map.get("text").and_then(Value::as_str).unwrap_or(""),
                _ => "",
            })
            .collect(),
        _ => String::new(),
    }
}
