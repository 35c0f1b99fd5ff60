//! SSE (Server-Sent Events) ingestion
//!
//! Turns a response body into canonical events:
//! - `event: <type>` - event type line
//! - `data: <json>` - data payload line(s), joined by `\n`
//! - Empty line - signals end of frame
//! - Lines starting with `:` - heartbeats
//!
//! # Module structure
//! - `events` - Frame and event types (RawFrame, RawEvent, NormalizedEvent)
//! - `frame` - Incremental frame reader and data decoding
//! - `normalize` - Dialect and alias resolution to canonical tags
//! - `payloads` - Field extraction from decoded payloads
//! - `dedup` - Duplicate and out-of-order chunk suppression

pub mod dedup;
mod events;
pub mod frame;
pub mod normalize;
pub mod payloads;

// Re-export public types
pub use dedup::{ChunkRecord, DedupGuard, DedupVerdict};
pub use events::{
    CanonicalTag, Channel, ControlAction, Frame, NormalizedEvent, RawEvent, RawFrame,
};
pub use frame::{decode, FrameReader, DONE_MARKER};
pub use normalize::{normalize, resolve_tag, snake_case, TagResolution};
