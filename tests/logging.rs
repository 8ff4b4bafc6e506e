// tests/logging.rs

use dlqueue::cli::LogLevel;
use dlqueue::logging::resolve_level;
use tracing::Level;

#[test]
fn cli_flag_wins_over_env() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), Level::DEBUG);
}

#[test]
fn env_value_is_used_without_flag() {
    assert_eq!(resolve_level(None, Some(" Warning ")), Level::WARN);
    assert_eq!(resolve_level(None, Some("trace")), Level::TRACE);
}

#[test]
fn falls_back_to_info() {
    assert_eq!(resolve_level(None, None), Level::INFO);
    assert_eq!(resolve_level(None, Some("loud")), Level::INFO);
}
