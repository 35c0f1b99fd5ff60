//! Identity header provider abstraction.
//!
//! The backend correlates a turn with a guest, a browser/app session and a
//! client installation. Where those identifiers are stored is not this
//! crate's concern; it only asks for the headers.

use super::http::Headers;

/// Header carrying the guest identifier.
pub const GUEST_ID_HEADER: &str = "X-Guest-Id";
/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "X-Session-Id";
/// Header carrying the client installation identifier.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";
/// Header carrying the per-turn client message identifier.
pub const CLIENT_MESSAGE_ID_HEADER: &str = "X-Client-Message-Id";

/// Supplies identity headers for outbound requests.
///
/// Both the streaming request and the JSON fallback request are built from
/// the same headers, so the backend sees one identity per turn.
pub trait IdentityProvider: Send + Sync {
    /// Headers to attach to every request.
    fn identity_headers(&self) -> Headers;
}

/// Provider that attaches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn identity_headers(&self) -> Headers {
        Headers::new()
    }
}
