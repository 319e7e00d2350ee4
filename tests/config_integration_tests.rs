//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Defaults for a missing file and for missing keys
//! - Profile lookup on loaded configurations

use camino::Utf8PathBuf;
use mcm_compressor::config::CONFIG_FILE_NAME;
use mcm_compressor::{CompressorConfig, ConfigManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.config_path(), &config_path.join(CONFIG_FILE_NAME));
}

#[test]
fn test_config_dir_is_created() {
    let (_temp_dir, root) = create_test_config_dir();
    let config_dir = root.join("Compressor Data");

    let manager = ConfigManager::new(&config_dir).unwrap();
    assert!(config_dir.is_dir());
    assert_eq!(manager.config_dir(), &config_dir);
}

#[test]
fn test_load_default_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load_config().unwrap();
    let settings = &config.settings;

    assert_eq!(settings.default_profile, "max");
    assert_eq!(settings.mode_flag(None), Some("-x11"));
    assert_eq!(settings.output_extension, "mcm");
    assert!(settings.taskbar_progress);
}

#[test]
fn test_load_hand_written_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let yaml = r#"Compressor_Settings:
  Tool Path: "C:/Tools/MCM/mcm.exe"
  Default Profile: quick
  Profiles:
    quick: "-f"
    archive: "-x11"
  Output Extension: arc
  Taskbar Progress: false
"#;
    fs::write(manager.config_path(), yaml).unwrap();

    let config = manager.load_config().unwrap();
    let settings = &config.settings;

    assert_eq!(settings.tool_path, "C:/Tools/MCM/mcm.exe");
    assert_eq!(settings.mode_flag(None), Some("-f"));
    assert_eq!(settings.mode_flag(Some("Archive")), Some("-x11"));
    assert_eq!(settings.mode_flag(Some("max")), None);
    assert_eq!(settings.profile_names(), vec!["quick", "archive"]);
    assert_eq!(settings.output_extension, "arc");
    assert!(!settings.taskbar_progress);
    // Not in the file
    assert_eq!(settings.event_buffer, 256);
    assert!(!settings.debug_mode);
}

#[test]
fn test_save_and_reload_preserves_profile_order() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = CompressorConfig::default();
    config
        .settings
        .profiles
        .insert("custom".to_string(), "-x9".to_string());
    manager.save_config(&config).unwrap();

    let contents = fs::read_to_string(manager.config_path()).unwrap();
    assert!(contents.contains("Compressor_Settings"));
    assert!(contents.contains("Tool Path"));

    let reloaded = manager.load_config().unwrap();
    assert_eq!(
        reloaded.settings.profile_names(),
        vec!["turbo", "fast", "mid", "high", "max", "custom"]
    );
    assert_eq!(reloaded.settings.mode_flag(Some("custom")), Some("-x9"));
}

#[test]
fn test_empty_file_uses_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "{}").unwrap();

    let config = manager.load_config().unwrap();
    assert_eq!(config.settings.default_profile, "max");
}
