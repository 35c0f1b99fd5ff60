//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - streaming and buffered POST requests
//! - [`IdentityProvider`] - guest/session/client identity headers

pub mod http;
pub mod identity;

pub use http::{header_value, ByteStream, Headers, HttpClient, HttpError, Response, StreamResponse};
pub use identity::{
    IdentityProvider, NoIdentity, CLIENT_ID_HEADER, CLIENT_MESSAGE_ID_HEADER, GUEST_ID_HEADER,
    SESSION_ID_HEADER,
};
