use serde_json::Value;

use crate::error::ProtocolError;
use crate::sse::payloads;

/// Keys the JSON endpoint has used for the answer text, in lookup order.
const REPLY_TEXT_KEYS: &[&str] = &["message", "text", "content", "resposta", "answer"];

/// Parsed body of the non-streaming endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FallbackReply {
    pub text: String,
    pub metadata: Option<Value>,
    pub primeira_memoria_significativa: bool,
}

impl FallbackReply {
    /// Parse a reply body. Only a non-object body is an error; a reply
    /// without text yields an empty `text`.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        if let Value::String(text) = value {
            return Ok(Self {
                text: text.clone(),
                ..Self::default()
            });
        }
        if !value.is_object() {
            return Err(ProtocolError::InvalidFallbackBody {
                message: format!("expected an object, got {}", kind_of(value)),
            });
        }

        let text = REPLY_TEXT_KEYS
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(nested @ Value::Object(_)) => payloads::extract_text(nested),
                _ => None,
            })
            .or_else(|| {
                value
                    .get("response")
                    .and_then(|r| r.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let metadata = value
            .get("metadata")
            .filter(|m| m.is_object())
            .cloned();

        Ok(Self {
            text,
            metadata,
            primeira_memoria_significativa: payloads::primeira_flag(value),
        })
    }

    /// Parse a raw response body.
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ProtocolError::InvalidFallbackBody {
                message: e.to_string(),
            })?;
        Self::from_value(&value)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_keys_in_order() {
        let reply = FallbackReply::from_value(&json!({"message": "a", "text": "b"})).unwrap();
        assert_eq!(reply.text, "a");

        let reply = FallbackReply::from_value(&json!({"resposta": "olá"})).unwrap();
        assert_eq!(reply.text, "olá");

        let reply = FallbackReply::from_value(&json!({"message": {"content": "nested"}})).unwrap();
        assert_eq!(reply.text, "nested");

        let reply = FallbackReply::from_value(&json!({"response": {"text": "r"}})).unwrap();
        assert_eq!(reply.text, "r");
    }

    #[test]
    fn test_metadata_and_flag() {
        let reply = FallbackReply::from_value(&json!({
            "answer": "x",
            "metadata": {"model": "m"},
            "primeiraMemoriaSignificativa": true
        }))
        .unwrap();
        assert_eq!(reply.metadata, Some(json!({"model": "m"})));
        assert!(reply.primeira_memoria_significativa);
    }

    #[test]
    fn test_missing_text_is_empty() {
        let reply = FallbackReply::from_value(&json!({"ok": true})).unwrap();
        assert_eq!(reply.text, "");
    }

    #[test]
    fn test_invalid_bodies() {
        assert!(FallbackReply::parse("<html>").is_err());
        let err = FallbackReply::from_value(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert_eq!(FallbackReply::parse("\"plain\"").unwrap().text, "plain");
    }
}
