//! Duplicate and out-of-order suppression for chunk events.
//!
//! Backends that retry or replay a stream resend chunks they already
//! delivered. Each chunk is reduced to a [`ChunkRecord`] (an identifier and
//! a numeric index found anywhere in a small set of wrapper objects) and the
//! per-session [`DedupGuard`] drops repeats and anything behind the index
//! watermark.

use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use super::payloads;

/// Deepest wrapper level searched for index keys.
const MAX_DEPTH: usize = 4;

/// Wrapper keys the traversal descends into.
const NESTED_KEYS: &[&str] = &["payload", "delta", "message", "content", "data"];

/// Index keys matched exactly, in priority order.
const EXACT_INDEX_KEYS: &[&str] = &["chunk_index", "chunkIndex", "index"];

/// Index keys matched by prefix (`cursor`, `cursorId`, `token_index_v2`, ...).
const PREFIX_INDEX_KEYS: &[&str] = &["cursor", "token_index", "delta_index", "delta_id"];

/// Identity of one chunk as seen by the guard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkRecord {
    /// `index:<n>` or `index:<string>`
    pub identifier: Option<String>,
    /// First candidate convertible to a finite number
    pub index: Option<f64>,
}

impl ChunkRecord {
    /// Collect index candidates from `roots`, in order, and reduce them.
    pub fn extract(roots: &[&Value]) -> Self {
        let mut seen: HashSet<*const Value> = HashSet::new();
        let mut candidates: Vec<&Value> = Vec::new();
        for root in roots {
            collect(root, 0, &mut seen, &mut candidates);
        }

        let identifier = candidates
            .iter()
            .find_map(|value| value.as_number().map(|n| format!("index:{}", n)))
            .or_else(|| {
                candidates.iter().find_map(|value| {
                    value
                        .as_str()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| format!("index:{}", s))
                })
            });
        let index = candidates.iter().find_map(|value| payloads::as_finite(value));

        Self { identifier, index }
    }

    /// True when the chunk carries nothing the guard can key on.
    pub fn is_anonymous(&self) -> bool {
        self.identifier.is_none() && self.index.is_none()
    }
}

fn is_prefix_key(key: &str) -> bool {
    PREFIX_INDEX_KEYS.iter().any(|p| key.starts_with(p))
}

fn collect<'a>(
    node: &'a Value,
    depth: usize,
    seen: &mut HashSet<*const Value>,
    out: &mut Vec<&'a Value>,
) {
    if depth > MAX_DEPTH || !seen.insert(node as *const Value) {
        return;
    }
    let Some(map) = node.as_object() else {
        return;
    };

    // Exact keys first so `chunk_index` beats an incidental `id`.
    for key in EXACT_INDEX_KEYS {
        if let Some(value) = map.get(*key) {
            out.push(value);
        }
    }
    for (key, value) in map {
        if is_prefix_key(key) {
            out.push(value);
        }
    }
    if let Some(value) = map.get("id") {
        out.push(value);
    }

    for key in NESTED_KEYS {
        if let Some(child @ Value::Object(_)) = map.get(*key) {
            collect(child, depth + 1, seen, out);
        }
    }
}

/// Guard decision for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Accept,
    /// Identifier already accepted this session
    DuplicateId,
    /// Index at or below the watermark
    OutOfOrder,
}

impl DedupVerdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, DedupVerdict::Accept)
    }
}

/// Per-session chunk filter. Never shared between sessions.
#[derive(Debug, Default)]
pub struct DedupGuard {
    seen_ids: HashSet<String>,
    watermark: Option<f64>,
    dropped: usize,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide on a chunk and record it when accepted.
    pub fn admit(&mut self, record: &ChunkRecord) -> DedupVerdict {
        if let Some(id) = &record.identifier {
            if self.seen_ids.contains(id) {
                self.dropped += 1;
                debug!("Dropping duplicate chunk {}", id);
                return DedupVerdict::DuplicateId;
            }
        }
        if let (Some(index), Some(watermark)) = (record.index, self.watermark) {
            if index <= watermark {
                self.dropped += 1;
                debug!(
                    "Dropping out-of-order chunk {} (watermark {})",
                    index, watermark
                );
                return DedupVerdict::OutOfOrder;
            }
        }

        if let Some(id) = &record.identifier {
            self.seen_ids.insert(id.clone());
        }
        if let Some(index) = record.index {
            self.watermark = Some(self.watermark.map_or(index, |w| w.max(index)));
        }
        DedupVerdict::Accept
    }

    /// Highest index accepted so far.
    pub fn watermark(&self) -> Option<f64> {
        self.watermark
    }

    /// Chunks rejected so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
