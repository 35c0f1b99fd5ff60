//! Environment-driven configuration. Tests touching process env are serial.

use std::time::Duration;

use convo_stream::config::{
    ConfigError, StreamConfig, ENV_FALLBACK, ENV_FALLBACK_MS, ENV_FIRST_TOKEN_MS, ENV_STEADY_MS,
    ENV_TYPING_MS, ENV_URL,
};
use serial_test::serial;

const ALL: [&str; 6] = [
    ENV_URL,
    ENV_FALLBACK,
    ENV_FALLBACK_MS,
    ENV_FIRST_TOKEN_MS,
    ENV_STEADY_MS,
    ENV_TYPING_MS,
];

fn clear_env() {
    for var in ALL {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    clear_env();
    std::env::set_var(ENV_URL, "https://chat.example.com/");
    std::env::set_var(ENV_FALLBACK, "false");
    std::env::set_var(ENV_FIRST_TOKEN_MS, "1500");
    std::env::set_var(ENV_TYPING_MS, "90000");

    let config = StreamConfig::try_from_env().unwrap();
    clear_env();

    assert_eq!(config.base_url, "https://chat.example.com");
    assert_eq!(config.stream_url(), "https://chat.example.com/v1/stream");
    assert!(!config.fallback_enabled);
    assert_eq!(config.first_token_timeout, Duration::from_millis(1500));
    assert_eq!(config.typing_timeout, Duration::from_secs(90));
    assert_eq!(config.steady_timeout, Duration::from_secs(30));
}

#[test]
#[serial]
fn test_strict_env_reports_bad_values() {
    clear_env();
    std::env::set_var(ENV_STEADY_MS, "thirty");

    let result = StreamConfig::try_from_env();
    clear_env();

    assert_eq!(
        result.unwrap_err(),
        ConfigError::InvalidDuration {
            var: ENV_STEADY_MS.to_string(),
            value: "thirty".to_string(),
        }
    );
}

#[test]
#[serial]
fn test_lenient_env_keeps_defaults() {
    clear_env();
    std::env::set_var(ENV_FALLBACK_MS, "-5");
    std::env::set_var(ENV_URL, "chat.example.com");

    let config = StreamConfig::from_env();
    clear_env();

    assert_eq!(config, StreamConfig::default());
}

#[test]
#[serial]
fn test_empty_env_is_default() {
    clear_env();
    assert_eq!(StreamConfig::try_from_env().unwrap(), StreamConfig::default());
}
