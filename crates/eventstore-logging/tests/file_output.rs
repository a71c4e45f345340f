//! End-to-end check of JSONL file output
//!
//! A global subscriber can only be installed once per process, so only
//! one test in this file installs it.

use eventstore_logging::{
    ConsoleConfig, EventStoreSubscriberBuilder, FileConfig, LogConfig, LoggingError,
    RotationStrategy,
};
use tempfile::TempDir;

#[test]
fn test_jsonl_file_output_and_single_install() {
    let temp_dir = TempDir::new().unwrap();
    let config = LogConfig {
        console: ConsoleConfig {
            enabled: false,
            ..Default::default()
        },
        file: Some(FileConfig {
            directory: temp_dir.path().to_path_buf(),
            prefix: "events".to_string(),
            rotation: RotationStrategy::Never,
        }),
        ..Default::default()
    };

    let guard = EventStoreSubscriberBuilder::new()
        .with_config(config)
        .try_init()
        .unwrap();
    assert!(guard.is_some());

    tracing::error!(source = "press", "cluster directory unreadable");
    drop(guard);

    let contents = std::fs::read_to_string(temp_dir.path().join("events.log")).unwrap();
    let line = contents.lines().last().unwrap();
    assert!(line.starts_with('{'));
    assert!(line.contains("cluster directory unreadable"));
    assert!(line.contains("\"source\":\"press\""));

    let second = EventStoreSubscriberBuilder::new().try_init();
    assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
}

#[test]
fn test_config_from_toml() {
    let config: LogConfig = toml::from_str(
        r#"
        default_level = "debug"

        [console]
        pretty = true

        [file]
        directory = "/var/log/eventstore"
        rotation = "hourly"

        [filters]
        exclude_crates = ["redb"]
        "#,
    )
    .unwrap();

    assert_eq!(config.default_level, "debug");
    assert!(config.console.enabled);
    assert!(config.console.pretty);
    let file = config.file.unwrap();
    assert_eq!(file.rotation, RotationStrategy::Hourly);
    assert_eq!(file.prefix, "eventstore");
    assert_eq!(config.filters.exclude_crates, vec!["redb".to_string()]);
}
