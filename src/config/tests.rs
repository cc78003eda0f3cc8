use std::fs;
use std::path::Path;

use serial_test::serial;

use super::load_config;
use super::settings::{PartialSettings, Settings};
use crate::pipeline::{AckMode, UnprocessedPolicy};

fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir).unwrap();
    let result = f();
    std::env::set_current_dir(previous).unwrap();
    result
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.scan_interval_ms, 5000);
    assert_eq!(settings.broker.endpoint, "sb://embus.local");
    assert_eq!(settings.delivery.ack_mode, AckMode::Manual);
    assert_eq!(settings.delivery.unprocessed, UnprocessedPolicy::LeaveUncompleted);
    assert_eq!(settings.logging.level, "info");
    assert!(settings.topology.queues.is_empty());
    assert!(settings.topology.topics.is_empty());
}

#[test]
fn test_partial_settings_fill_missing_values() {
    let partial: PartialSettings = serde_json::from_str(
        r#"{ "broker": { "scan_interval_ms": 100 }, "delivery": { "unprocessed": "dead_letter" } }"#,
    )
    .unwrap();

    let settings = partial.merge_with_defaults();
    assert_eq!(settings.broker.scan_interval_ms, 100);
    assert_eq!(settings.broker.endpoint, "sb://embus.local");
    assert_eq!(settings.delivery.ack_mode, AckMode::Manual);
    assert_eq!(settings.delivery.unprocessed, UnprocessedPolicy::DeadLetter);
}

#[test]
fn test_pipeline_options_follow_settings() {
    let mut settings = Settings::default();
    settings.delivery.ack_mode = AckMode::Auto;
    settings.broker.endpoint = "sb://test".to_string();

    let options = settings.pipeline_options();
    assert_eq!(options.ack_mode, AckMode::Auto);
    assert_eq!(options.unprocessed, UnprocessedPolicy::LeaveUncompleted);
    assert_eq!(options.endpoint, "sb://test");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = in_dir(dir.path(), load_config).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_load_config_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/default.toml"),
        r#"
[broker]
scan_interval_ms = 250

[logging]
level = "debug"

[topology]
queues = ["orders"]

[[topology.topics]]
name = "events"

[[topology.topics.subscriptions]]
name = "audit"
content_type = "OrderPlaced"
"#,
    )
    .unwrap();

    let settings = in_dir(dir.path(), load_config).unwrap();
    assert_eq!(settings.broker.scan_interval_ms, 250);
    assert_eq!(settings.broker.endpoint, "sb://embus.local");
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.topology.queues, vec!["orders"]);
    assert_eq!(settings.topology.topics[0].name, "events");
    assert_eq!(
        settings.topology.topics[0].subscriptions[0].content_type.as_deref(),
        Some("OrderPlaced")
    );
}

#[test]
#[serial]
fn test_environment_overrides() {
    let dir = tempfile::tempdir().unwrap();
    temp_env::with_vars(
        [
            ("EMBUS_BROKER__SCAN_INTERVAL_MS", Some("75")),
            ("EMBUS_DELIVERY__ACK_MODE", Some("auto")),
        ],
        || {
            let settings = in_dir(dir.path(), load_config).unwrap();
            assert_eq!(settings.broker.scan_interval_ms, 75);
            assert_eq!(settings.delivery.ack_mode, AckMode::Auto);
            assert_eq!(settings.logging.level, "info");
        },
    );
}
