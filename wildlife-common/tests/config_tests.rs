//! Configuration file loading and resolution tests
//!
//! Tests that touch WILDLIFE_CONFIG are marked #[serial] so they don't race
//! on the process environment. The variable itself is read by the binary's
//! argument parser; the library only sees the path it produced.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wildlife_common::config::{
    load_config_file, load_toml_config, resolve_config_path, ConfigOverrides, ConfigSource,
    ServiceConfig, CONFIG_ENV_VAR,
};

#[test]
fn test_missing_toml_file_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let loaded = load_toml_config(&missing).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_toml_file_values_are_used() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
upload_dir = "/srv/wildlife/uploads"
max_upload_bytes = 5242880
allowed_extensions = "jpg,png,webp"
predictor_url = "http://ml:8000"
predictor_timeout_ms = 1500
auto_create_species = false

[logging]
level = "debug"
"#
    )
    .unwrap();

    let toml = load_toml_config(&path).unwrap();
    let config = ServiceConfig::resolve(ConfigOverrides::default(), toml).unwrap();

    assert_eq!(config.upload_dir, PathBuf::from("/srv/wildlife/uploads"));
    assert_eq!(config.max_upload_bytes, 5_242_880);
    assert_eq!(config.allowed_extensions, vec!["jpg", "png", "webp"]);
    assert_eq!(config.predictor_url, "http://ml:8000");
    assert_eq!(config.predictor_timeout, Duration::from_millis(1500));
    assert!(!config.auto_create_species);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_malformed_toml_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "max_upload_bytes = \"lots\"").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_load_config_file_reports_source() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = 9090").unwrap();

    let (toml, source) = load_config_file(Some(&path)).unwrap();
    assert_eq!(toml.unwrap().port, Some(9090));
    assert_eq!(source, ConfigSource::File(path));
}

#[test]
fn test_load_config_file_missing_path() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("gone.toml");

    let (toml, source) = load_config_file(Some(&missing)).unwrap();
    assert!(toml.is_none());
    assert_eq!(source, ConfigSource::MissingFile(missing));
}

#[test]
fn test_explicit_path_is_used_as_given() {
    let cli = PathBuf::from("/from/cli.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
}

#[test]
#[serial]
fn test_environment_is_not_read_by_library() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    assert_ne!(resolve_config_path(None), Some(PathBuf::from("/from/env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}
