//! Process-wide tracing setup.

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Filter override checked before `RUST_LOG`.
pub const ENV_LOG: &str = "CONVO_STREAM_LOG";

static INIT: OnceCell<()> = OnceCell::new();

fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var(ENV_LOG) {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the subscriber once per process.
///
/// Logs go to stderr so streamed text on stdout stays clean. Filter comes
/// from `CONVO_STREAM_LOG`, then `RUST_LOG`, then `info`. Calling it again,
/// or after another subscriber was installed, does nothing.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let console_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(resolve_env_filter())
            .with(console_layer)
            .try_init();
    });
}
