//! Event normalizer.
//!
//! Maps a decoded frame onto one [`CanonicalTag`]. The backend has emitted
//! several dialects over time: bare legacy names (`chunk`, `token`,
//! `memoria`), the `response.*` namespace, and a `control` channel whose
//! payload names the real action. All of them resolve here, without I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::events::{CanonicalTag, Channel, ControlAction, NormalizedEvent, RawEvent};
use super::frame::DONE_MARKER;
use super::payloads;

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid camel boundary regex"));

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s.\-]+").expect("Invalid separator regex"));

const RESPONSE_NAMESPACE: &str = "response.";

/// Outcome of resolving a type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagResolution {
    /// Maps onto a canonical tag
    Tag(CanonicalTag),
    /// Known keep-alive name; carries nothing
    Ignore,
    /// Not a name this client knows
    Unknown,
}

/// Snake-case a type or control name.
///
/// `promptReady` → `prompt_ready`, `response.output-text` → `response_output_text`.
pub fn snake_case(name: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(name.trim(), "${1}_${2}");
    SEPARATORS
        .replace_all(&split, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Resolve a type string to a canonical tag.
pub fn resolve_tag(name: &str) -> TagResolution {
    let lowered = name.trim().to_lowercase();
    if let Some(rest) = lowered.strip_prefix(RESPONSE_NAMESPACE) {
        return TagResolution::Tag(resolve_response_namespace(rest));
    }
    resolve_alias(&snake_case(name))
}

/// Ordered rules for the `response.*` namespace; first match wins.
fn resolve_response_namespace(rest: &str) -> CanonicalTag {
    let ends_delta = rest.ends_with(".delta");

    if matches!(
        rest,
        "created" | "started" | "in_progress" | "input_message.delta"
    ) {
        return CanonicalTag::PromptReady;
    }
    if rest == "error" {
        return CanonicalTag::Error;
    }
    if rest == "completed" || rest.ends_with(".completed") || rest.ends_with(".done") || rest == "final"
    {
        return CanonicalTag::Done;
    }
    if rest.contains("metadata") {
        return if rest.contains("pending") || ends_delta {
            CanonicalTag::MetaPending
        } else {
            CanonicalTag::Meta
        };
    }
    if rest.contains("memory") {
        return CanonicalTag::MemorySaved;
    }
    if rest.contains("latency") {
        return CanonicalTag::Latency;
    }
    // output, message, tool, refusal and any *.delta are chunks; so is the rest.
    CanonicalTag::Chunk
}

fn resolve_alias(snake: &str) -> TagResolution {
    let tag = match snake {
        "chunk" | "delta" | "token" | "content" | "message" | "text" | "output_text" => {
            CanonicalTag::Chunk
        }
        "first_token" | "first_chunk" => CanonicalTag::FirstToken,
        "prompt_ready" | "ready" | "start" | "started" | "response_created" => {
            CanonicalTag::PromptReady
        }
        "meta" | "metadata" => CanonicalTag::Meta,
        "meta_pending" | "metadata_pending" => CanonicalTag::MetaPending,
        "memory_saved" | "memory" | "memoria" | "memoria_salva" => CanonicalTag::MemorySaved,
        "latency" => CanonicalTag::Latency,
        "error" => CanonicalTag::Error,
        "done" | "end" | "complete" | "completed" | "final" | "response_completed"
        | "response_done" => CanonicalTag::Done,
        "control" => CanonicalTag::Control,
        "ping" | "heartbeat" | "keepalive" | "keep_alive" => return TagResolution::Ignore,
        _ => return TagResolution::Unknown,
    };
    TagResolution::Tag(tag)
}

/// Tag from payload shape alone, when no type string resolved.
fn infer_from_payload(payload: &Value) -> Option<CanonicalTag> {
    if payload.as_str().map(str::trim) == Some(DONE_MARKER) || payloads::is_done_flag(payload) {
        return Some(CanonicalTag::Done);
    }
    if payloads::layers(payload).any(|layer| layer.get("text").map(Value::is_string) == Some(true))
    {
        return Some(CanonicalTag::Chunk);
    }
    None
}

fn is_control(working: Option<&str>, payload: &Value) -> bool {
    let literal = |s: &str| s.trim().eq_ignore_ascii_case("control");
    working.map(literal).unwrap_or(false) || payload.as_str().map(literal).unwrap_or(false)
}

/// Control action named by the payload's `name`/`event` leaf.
fn control_action(payload: &Value) -> Option<ControlAction> {
    let raw = match payloads::string_field(payload, "name")
        .or_else(|| payloads::string_field(payload, "event"))
    {
        Some(raw) => raw,
        // `event: control` + `data: [DONE]`
        None if payloads::is_done_flag(payload) => "done",
        None => return None,
    };
    let action = match resolve_tag(raw) {
        TagResolution::Tag(CanonicalTag::Control) => None,
        TagResolution::Tag(tag) => Some(tag),
        TagResolution::Ignore | TagResolution::Unknown => None,
    };
    Some(ControlAction {
        name: snake_case(raw),
        action,
    })
}

/// Normalize a decoded frame.
///
/// Returns `None` for keep-alives and for frames that resolve to nothing.
pub fn normalize(raw: &RawEvent) -> Option<NormalizedEvent> {
    let payload = raw.payload.clone().unwrap_or(Value::Null);

    let working = payloads::explicit_type(&payload)
        .or_else(|| payloads::nested_type(&payload))
        .or_else(|| {
            raw.event_type
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string);

    if is_control(working.as_deref(), &payload) {
        let control = control_action(&payload);
        debug!("Control event: {:?}", control);
        return Some(NormalizedEvent {
            tag: CanonicalTag::Control,
            payload,
            original_type: working,
            channel: Channel::Control,
            control,
        });
    }

    let resolved = match working.as_deref().map(resolve_tag) {
        Some(TagResolution::Tag(tag)) => Some(tag),
        Some(TagResolution::Ignore) => {
            debug!("Ignoring keep-alive event {:?}", working);
            return None;
        }
        Some(TagResolution::Unknown) | None => infer_from_payload(&payload),
    };

    match resolved {
        Some(tag) => Some(NormalizedEvent {
            tag,
            payload,
            original_type: working,
            channel: Channel::Data,
            control: None,
        }),
        None => {
            debug!("Dropping unrecognised event type {:?}", working);
            None
        }
    }
}
