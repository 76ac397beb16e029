//! Unit tests for configuration and document file IO

use social_capture::config::{Config, ConfigError, OutputFormat};
use social_capture::output::{self, DocumentPathBuilder};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

#[test]
fn test_load_config_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
discord:
  channels:
    - name: announcements
      channel_id: "123456789"
settings:
  output_format: json
"#,
    )
    .expect("write config");

    let config = Config::load(&path).expect("load");
    assert_eq!(config.discord.channels.len(), 1);
    assert_eq!(config.settings.output_format, OutputFormat::Json);
}

#[test]
fn test_load_missing_config_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let result = Config::load(dir.path().join("nope.yaml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "discord:\n  channels:\n    - name: broken\n      channel_id: general\n",
    )
    .expect("write config");

    assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_write_document_creates_parent_directories() {
    let dir = TempDir::new().expect("tempdir");
    let paths = DocumentPathBuilder::new(dir.path());
    let captured_at = Utc.with_ymd_and_hms(2023, 6, 1, 9, 30, 0).unwrap();
    let path = paths.document_path("discord", "Dev Chat", captured_at, "md");

    output::write_document(&path, "# hello\n").expect("write");

    let written = std::fs::read_to_string(&path).expect("read back");
    assert_eq!(written, "# hello\n");
    assert!(path.ends_with("discord/dev-chat_20230601_093000.md"));
}
