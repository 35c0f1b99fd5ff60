use serde_json::Value;

use crate::session::StreamStats;

/// Aggregate result of a turn that reached `done`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamOutcome {
    pub client_message_id: String,
    /// Trimmed final text
    pub text: String,
    /// Latest metadata object seen
    pub metadata: Option<Value>,
    pub done: bool,
    pub primeira_memoria_significativa: bool,
    /// The turn ended without a single content token
    pub no_text_received: bool,
    pub latency_ms: Option<f64>,
    /// Text came from the JSON fallback instead of the stream
    pub via_fallback: bool,
    pub stats: StreamStats,
}
