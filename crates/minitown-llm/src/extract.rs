//! Structured-output extraction from raw model text.
//!
//! The model is asked to emit a single JSON object with an `output` key.
//! In practice it wraps the object in markdown fences, prose, or both, so
//! extraction runs through recovery strategies in order:
//!
//! 1. a fenced ```` ```json ```` code block containing an object
//! 2. the outermost `{...}` span anywhere in the text
//! 3. for string-typed defaults, the trimmed raw text
//! 4. the caller's default
//!
//! The caller's default also carries the *type* contract: a string default
//! means plain text was expected; a list/map default means JSON.

use serde_json::Value;

/// Extract the typed output from raw model text.
///
/// Never fails; on any mismatch the caller's default is returned.
pub fn extract_output(raw: &str, default: &Value) -> Value {
    let json_span = fenced_json(raw).or_else(|| outermost_braces(raw));

    let Some(span) = json_span else {
        if default.is_string() {
            return Value::String(raw.trim().to_owned());
        }
        return default.clone();
    };

    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => {
            if let Some(output) = map.get("output") {
                output.clone()
            } else {
                Value::Object(map)
            }
        }
        Ok(other) => other,
        Err(_) => {
            if default.is_string() {
                Value::String(raw.trim().to_owned())
            } else {
                default.clone()
            }
        }
    }
}

/// Find the body of a ```` ```json ```` fence containing an object.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")?;
    let body_start = start + "```json".len();
    let rest = text.get(body_start..)?;
    let end = rest.find("```")?;
    let body = rest.get(..end)?.trim();
    if body.starts_with('{') && body.ends_with('}') {
        Some(body)
    } else {
        None
    }
}

/// The span from the first `{` to the last `}`.
fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        text.get(start..=end)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_fenced_block() {
        let raw = "好的，以下是結果：\n```json\n{\"output\": [[\"工作\", 240]]}\n```\n完畢。";
        let out = extract_output(raw, &json!([]));
        assert_eq!(out, json!([["工作", 240]]));
    }

    #[test]
    fn extracts_outermost_braces() {
        let raw = "結果 {\"output\": {\"action\": \"休息\", \"thought\": \"累了\"}} 謝謝";
        let out = extract_output(raw, &json!({}));
        assert_eq!(out["action"], "休息");
    }

    #[test]
    fn object_without_output_key_is_returned_whole() {
        let raw = r#"{"action": "評估周圍環境", "thought": "先看看"}"#;
        let out = extract_output(raw, &json!({"action": "x", "thought": "y"}));
        assert_eq!(out["action"], "評估周圍環境");
    }

    #[test]
    fn string_default_returns_trimmed_text() {
        let out = extract_output("  一句內心話。  ", &json!("備用"));
        assert_eq!(out, json!("一句內心話。"));
    }

    #[test]
    fn garbage_with_list_default_returns_default() {
        let out = extract_output("totally not json", &json!([["自由活動", 1440]]));
        assert_eq!(out, json!([["自由活動", 1440]]));
    }

    #[test]
    fn malformed_braces_fall_back() {
        let out = extract_output("{not json at all]", &json!({"k": 1}));
        assert_eq!(out, json!({"k": 1}));
    }
}
