//! Settings file round trips through the filesystem

use std::fs;
use tempfile::TempDir;
use xytable_core::{DigitalOutput, QuickMoveIncrement};
use xytable_settings::{Config, SettingsError};

#[test]
fn test_save_and_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.backend.base_url = "http://table.local:8000".to_string();
    config.jog.default_increment = QuickMoveIncrement::Tenth;
    config.jog.output = DigitalOutput::Start;
    config.save_to_file(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[backend]"));
    assert!(text.contains("default_increment = 0.1"));

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_save_and_load_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.health.max_attempts = 5;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.health.max_attempts, 5);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[health]\nmax_attempts = 0\n").unwrap();

    let err = Config::load_or_default(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));

    fs::write(&path, "[backend\n").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::Config(_))
    ));
}
