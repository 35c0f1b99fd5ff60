use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    #[default]
    User,
    Assistant,
    System,
}

/// One message of the conversation sent with a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for one conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// Identifies the turn; at most one live stream per id
    pub client_message_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// `true` for the SSE endpoint, `false` for the JSON fallback
    pub stream: bool,
    /// Extra top-level fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamRequest {
    /// Create a StreamRequest for a single user message
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_messages(vec![ChatMessage::user(content)])
    }

    /// Create a StreamRequest carrying a whole conversation
    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            client_message_id: Uuid::new_v4().to_string(),
            messages,
            user_id: None,
            user_name: None,
            stream: true,
            extra: Map::new(),
        }
    }

    /// Reuse a client message id (resending the same turn)
    pub fn with_client_message_id(mut self, id: impl Into<String>) -> Self {
        self.client_message_id = id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, user_name: Option<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.user_name = user_name;
        self
    }

    /// Add a pass-through field (builder pattern)
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Same turn, addressed to the non-streaming endpoint
    pub fn for_fallback(&self) -> Self {
        Self {
            stream: false,
            ..self.clone()
        }
    }
}
