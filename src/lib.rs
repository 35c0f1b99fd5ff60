//! convo-stream - streaming ingestion and session management for
//! conversational turns over Server-Sent Events.
//!
//! - [`sse`] turns a byte stream into canonical, deduplicated events
//! - [`session`] runs a turn: watchdogs, JSON fallback, abort, single-flight
//! - [`client`] is the entry point most callers want
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod session;
pub mod sse;
pub mod traits;
