//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`StaticIdentity`] - fixed identity headers
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides [`mock::MockHttpClient`], which serves
//! canned JSON and SSE bodies and records requests.

pub mod identity;
pub mod mock;
pub mod reqwest_http;

pub use identity::StaticIdentity;
pub use mock::MockHttpClient;
pub use reqwest_http::ReqwestHttpClient;
