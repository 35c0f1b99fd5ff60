//! Request and result types exchanged with the backend.

mod outcome;
mod reply;
mod request;

pub use outcome::StreamOutcome;
pub use reply::FallbackReply;
pub use request::{ChatMessage, ChatRole, StreamRequest};
