//! Field extraction from decoded SSE payloads.
//!
//! The backend speaks several dialects, so fields are looked up by a list of
//! accepted names instead of a fixed schema. Everything here is a pure
//! function over `serde_json::Value`.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Keys that may hold chunk text, in lookup order.
pub(crate) const TEXT_KEYS: &[&str] = &["text", "delta", "content", "message"];

/// Keys that may hold a metadata object.
const META_KEYS: &[&str] = &["metadata", "response"];

/// Keys that may hold a memory payload.
const MEMORY_KEYS: &[&str] = &["memory", "memoria"];

/// Keys that may hold a latency number.
const LATENCY_KEYS: &[&str] = &["value", "latency"];

/// Keys carrying the "first significant memory" flag.
const PRIMEIRA_KEYS: &[&str] = &["primeiraMemoriaSignificativa", "primeira"];

/// Extra keys a `done` payload may carry the final answer under.
const DONE_TEXT_KEYS: &[&str] = &["final_text", "output_text", "answer", "resposta"];

/// Nesting limit when following text through wrapper objects.
const TEXT_DEPTH: usize = 4;

/// Error payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(alias = "error", alias = "detail")]
    pub message: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
}

/// Object wrapped inside `payload` or `data`, when present.
pub fn unwrap_payload(payload: &Value) -> Option<&Value> {
    let map = payload.as_object()?;
    ["payload", "data"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|inner| inner.is_object())
}

/// The payload itself followed by its unwrapped form.
pub fn layers(payload: &Value) -> impl Iterator<Item = &Value> {
    std::iter::once(payload).chain(unwrap_payload(payload))
}

/// Non-empty string field `key` from the payload or its unwrapped form.
pub fn string_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    layers(payload)
        .filter_map(|layer| layer.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Explicit `type` field on the payload (not on the unwrapped payload).
pub fn explicit_type(payload: &Value) -> Option<&str> {
    payload
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `type` field of the unwrapped payload.
pub fn nested_type(payload: &Value) -> Option<&str> {
    unwrap_payload(payload)
        .and_then(|inner| inner.get("type"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Chunk text of an event, following `delta`/`message` wrappers.
///
/// Returns the text verbatim (no trimming) since whitespace between chunks is
/// content.
pub fn extract_text(payload: &Value) -> Option<String> {
    if let Value::String(s) = payload {
        return Some(s.clone());
    }
    layers(payload).find_map(|layer| text_in(layer, 0))
}

fn text_in(value: &Value, depth: usize) -> Option<String> {
    if depth > TEXT_DEPTH {
        return None;
    }
    let map = value.as_object()?;
    for key in TEXT_KEYS {
        match map.get(*key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(nested @ Value::Object(_)) => {
                if let Some(text) = text_in(nested, depth + 1) {
                    return Some(text);
                }
            }
            Some(Value::Array(parts)) => {
                let joined: String = parts
                    .iter()
                    .filter_map(|part| match part {
                        Value::String(s) => Some(s.clone()),
                        other => text_in(other, depth + 1),
                    })
                    .collect();
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            _ => {}
        }
    }
    None
}

/// Protocol noise that must not count as content.
pub fn is_trivial(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("ok")
}

/// Metadata carried by a `meta`/`meta_pending` event.
///
/// Prefers an explicit `metadata`/`response` object, otherwise the payload
/// minus its `type` field.
pub fn extract_metadata(payload: &Value) -> Option<Value> {
    for layer in layers(payload) {
        for key in META_KEYS {
            if let Some(meta @ Value::Object(_)) = layer.get(*key) {
                return Some(meta.clone());
            }
        }
    }
    let map = payload.as_object()?;
    let stripped: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| key.as_str() != "type")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!stripped.is_empty()).then_some(Value::Object(stripped))
}

/// Memory object of a `memory_saved` event.
pub fn extract_memory(payload: &Value) -> Option<Value> {
    layers(payload)
        .flat_map(|layer| MEMORY_KEYS.iter().filter_map(move |key| layer.get(*key)))
        .find(|value| !value.is_null())
        .cloned()
}

/// Whether the payload signals the first significant memory.
///
/// The flag is looked up on the payload, its unwrapped form, and inside the
/// memory object.
pub fn primeira_flag(payload: &Value) -> bool {
    let memory = extract_memory(payload);
    let found = layers(payload)
        .chain(memory.as_ref())
        .any(|layer| PRIMEIRA_KEYS.iter().any(|key| is_truthy(layer.get(*key))));
    found
}

/// Latency value in milliseconds.
pub fn extract_latency(payload: &Value) -> Option<f64> {
    if let Some(n) = as_finite(payload) {
        return Some(n);
    }
    layers(payload)
        .flat_map(|layer| LATENCY_KEYS.iter().filter_map(move |key| layer.get(*key)))
        .find_map(as_finite)
}

/// `done: true` or `DONE: true` on the payload.
pub fn is_done_flag(payload: &Value) -> bool {
    layers(payload).any(|layer| is_truthy(layer.get("done")) || is_truthy(layer.get("DONE")))
}

/// Text a `done` payload carries when the stream produced none.
pub fn done_fallback_text(payload: &Value) -> Option<String> {
    let direct = extract_text(payload).filter(|t| !t.trim().is_empty());
    if direct.is_some() {
        return direct;
    }
    layers(payload)
        .flat_map(|layer| {
            DONE_TEXT_KEYS
                .iter()
                .filter_map(move |key| layer.get(*key).and_then(Value::as_str))
        })
        .chain(
            payload
                .get("response")
                .and_then(|r| r.get("text"))
                .and_then(Value::as_str),
        )
        .map(str::to_string)
        .find(|t| !t.trim().is_empty())
}

/// Message and code of an `error` event.
pub fn extract_error(payload: &Value) -> (String, Option<String>) {
    let parsed = serde_json::from_value::<ErrorPayload>(payload.clone()).ok();
    let message = parsed
        .as_ref()
        .and_then(|p| p.message.as_ref())
        .and_then(|m| match m {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => m.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .or_else(|| payload.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Stream error".to_string());
    let code = parsed.and_then(|p| p.code).and_then(|c| match c {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    (message, code)
}

/// Number or numeric string, if finite.
pub fn as_finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}
