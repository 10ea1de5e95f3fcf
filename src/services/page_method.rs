//! Helpers for ASP.NET page-method payloads.

use serde_json::Value as JsonValue;

/// Page methods wrap their result under this key
pub const ENVELOPE_KEY: &str = "d";

/// `Encryptar` answers with a query-string fragment starting with this prefix
pub const ENC_QUERY_PREFIX: &str = "?enc=";

const TRUTHY: [&str; 7] = ["true", "1", "si", "sí", "ok", "yes", "y"];
const FALSY: [&str; 5] = ["false", "0", "no", "null", ""];

/// Strip one `{"d": ...}` layer.
///
/// When the wrapped value is a string that looks like a JSON object or array
/// it is decoded once more; if that decode fails the string is returned as-is.
/// Anything that is not an envelope passes through unchanged.
pub fn unwrap_envelope(body: JsonValue) -> JsonValue {
    let payload = match body {
        JsonValue::Object(mut map) if map.contains_key(ENVELOPE_KEY) => {
            map.remove(ENVELOPE_KEY).unwrap_or(JsonValue::Null)
        }
        other => return other,
    };

    if let JsonValue::String(text) = &payload {
        let trimmed = text.trim();
        let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'));
        if looks_like_json {
            if let Ok(decoded) = serde_json::from_str::<JsonValue>(trimmed) {
                return decoded;
            }
        }
    }
    payload
}

/// Coerce the many ways `ValidaSolicitud` says yes or no into a bool.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::String(text) => {
            let normalized = normalize_token(text);
            if TRUTHY.contains(&normalized.as_str()) {
                true
            } else if FALSY.contains(&normalized.as_str()) {
                false
            } else {
                // any other non-empty string is truthy
                true
            }
        }
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

/// Lowercase, trim and fold a decomposed acute accent (`i` + U+0301) into `í`.
fn normalize_token(text: &str) -> String {
    text.trim().to_lowercase().replace("i\u{301}", "í")
}

/// Percent-encode an `?enc=` token for the priming URL, keeping `=`, `?` and `&` literal.
pub fn encode_query_token(token: &str) -> String {
    let mut encoded = String::with_capacity(token.len());
    let mut segment_start = 0;
    for (idx, ch) in token.char_indices() {
        if matches!(ch, '=' | '?' | '&') {
            encoded.push_str(&urlencoding::encode(&token[segment_start..idx]));
            encoded.push(ch);
            segment_start = idx + ch.len_utf8();
        }
    }
    encoded.push_str(&urlencoding::encode(&token[segment_start..]));
    encoded
}
