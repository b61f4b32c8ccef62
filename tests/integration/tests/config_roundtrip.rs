//! Config save/load roundtrip integration tests.

use std::path::Path;
use tempfile::TempDir;
use vaultkeep_core::config::{Config, ConfigBuilder};

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.kdf.iterations, config.kdf.iterations);
    assert_eq!(loaded.audit.highlight_old_days, config.audit.highlight_old_days);
    assert_eq!(loaded.audit.report_old_days, config.audit.report_old_days);
    assert_eq!(loaded.cache.ttl_secs, config.cache.ttl_secs);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    ConfigBuilder::new()
        .kdf_iterations(400_000)
        .idle_timeout_secs(60)
        .build()
        .save(&path)
        .unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.kdf.iterations, 400_000);
    assert_eq!(loaded.session.idle_timeout_secs, 60);
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/config.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    assert!(Config::parse("not valid json").is_err());
}

#[test]
fn test_saved_low_iterations_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");
    std::fs::write(&path, "{ kdf: { iterations: 1000 } }").unwrap();

    let loaded = Config::load(&path).unwrap();
    assert!(loaded.validate().is_err());
}
