//! Settings file integration tests.

use std::path::PathBuf;

use article_harvest_cli::settings::{Environment, Settings, SettingsError};

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{ "environment": "hosted", "wait_timeout_ms": 5000, "chromium_path": "/opt/chrome" }"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();

    assert_eq!(settings.environment, Environment::Hosted);
    assert_eq!(settings.wait_timeout_ms, 5000);
    assert_eq!(settings.chromium_path, Some(PathBuf::from("/opt/chrome")));
    assert_eq!(settings.settle_delay_ms, 200);
    assert_eq!(settings.asset_folder, "images");
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "environment": "cloud" }"#).unwrap();

    match Settings::from_file(&path) {
        Err(SettingsError::Parse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    assert!(matches!(
        Settings::load(Some(missing.as_path())),
        Err(SettingsError::Read { .. })
    ));
}

#[test]
fn test_settings_round_trip_through_json() {
    let settings = Settings {
        max_items: Some(25),
        ..Settings::default()
    };
    let json = serde_json::to_string(&settings).unwrap();
    assert!(json.contains("\"environment\":\"local\""));
    let back: Settings = serde_json::from_str(&json).unwrap();
    assert_eq!(back, settings);
}
