use std::time::Duration;

/// Counters for one turn, reported with its outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub bytes_received: u64,
    /// Event frames read (heartbeats excluded)
    pub frames: u64,
    pub heartbeats: u64,
    pub events_dispatched: u64,
    /// Chunks rejected by the dedup guard
    pub chunks_dropped: u64,
    /// From send to the first content token
    pub time_to_first_token: Option<Duration>,
    /// From send to the terminal state
    pub elapsed: Duration,
}
