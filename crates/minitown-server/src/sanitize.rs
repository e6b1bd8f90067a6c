//! Frame payload sanitation and size-safe chunking.
//!
//! The LLM log and agent memories can grow without bound within a run;
//! before anything hits the socket, long strings are truncated, very
//! long lists are trimmed with a marker tail, and the serialized JSON is
//! split into consecutive text frames when it exceeds the chunk size.
//! The receiver buffers text frames until a complete JSON value parses.

use serde_json::Value;

/// Longest string leaf sent to the client, in characters.
const MAX_STRING_CHARS: usize = 6000;

/// Longest list sent to the client, in items.
const MAX_LIST_ITEMS: usize = 200;

/// Maximum characters per WebSocket text frame.
pub const CHUNK_CHARS: usize = 200_000;

/// Marker appended to truncated strings.
const TRUNCATED_SUFFIX: &str = "…[截斷]";

/// Truncate long strings and trim long lists, recursively.
pub fn sanitize_payload(value: &mut Value) {
    match value {
        Value::String(text) => {
            if text.chars().count() > MAX_STRING_CHARS {
                let mut kept: String = text.chars().take(MAX_STRING_CHARS).collect();
                kept.push_str(TRUNCATED_SUFFIX);
                *text = kept;
            }
        }
        Value::Array(items) => {
            if items.len() > MAX_LIST_ITEMS {
                items.truncate(MAX_LIST_ITEMS - 1);
                items.push(Value::String(TRUNCATED_SUFFIX.to_owned()));
            }
            for item in items {
                sanitize_payload(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                sanitize_payload(v);
            }
        }
        _ => {}
    }
}

/// Split serialized JSON into chunk-sized pieces on char boundaries.
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_CHARS {
        return vec![text.to_owned()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn long_strings_are_truncated_with_marker() {
        let mut value = json!({"log": "字".repeat(MAX_STRING_CHARS + 100)});
        sanitize_payload(&mut value);
        let text = value["log"].as_str().unwrap();
        assert!(text.ends_with(TRUNCATED_SUFFIX));
        assert!(text.chars().count() <= MAX_STRING_CHARS + TRUNCATED_SUFFIX.chars().count());
    }

    #[test]
    fn long_lists_get_marker_tail() {
        let mut value = json!(vec![1; MAX_LIST_ITEMS * 2]);
        sanitize_payload(&mut value);
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), MAX_LIST_ITEMS);
        assert_eq!(items.last().unwrap(), &json!(TRUNCATED_SUFFIX));
    }

    #[test]
    fn short_payloads_pass_untouched() {
        let mut value = json!({"a": "短字串", "b": [1, 2, 3]});
        let original = value.clone();
        sanitize_payload(&mut value);
        assert_eq!(value, original);
    }

    #[test]
    fn chunking_splits_and_reassembles() {
        let text = "界".repeat(CHUNK_CHARS + 1234);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), text);
        assert!(chunks[0].chars().count() == CHUNK_CHARS);
    }

    #[test]
    fn small_text_is_one_chunk() {
        let chunks = chunk_text("{\"type\":\"end\"}");
        assert_eq!(chunks.len(), 1);
    }
}
