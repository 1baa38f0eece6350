//! Tests for loading the scheduler configuration from JSON files
//!
//! These tests verify:
//! - Partial files fall back to defaults for everything they omit
//! - Profile overrides and capability lists are parsed
//! - Invalid values are rejected by validation

use squash_core::config::{DEFAULT_ADMISSION_POLL_MS, SchedulerConfig, SchedulerConfigBuilder};
use squash_core::profile::ProfileOverride;
use squash_core::{Capability, Category, CoreError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_file_parsing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("squash.json");
    fs::write(
        &config_path,
        r#"{
            "global_max_concurrent": 3,
            "capabilities": ["hasSimd", "hasWorkers"],
            "profiles": {
                "video": { "max_concurrent": 1, "streaming_threshold": 10485760 },
                "image": { "memory_multiplier": 2.5 }
            }
        }"#,
    )?;

    let config = SchedulerConfig::from_json_file(&config_path)?;
    config.validate()?;

    assert_eq!(config.global_max_concurrent, Some(3));
    assert_eq!(config.admission_poll_interval_ms, DEFAULT_ADMISSION_POLL_MS);
    assert_eq!(
        config.capabilities,
        Some(vec![Capability::Simd, Capability::Threads])
    );

    let profiles = config.profile_registry()?;
    assert_eq!(profiles.get(Category::Video).max_concurrent, 1);
    assert_eq!(profiles.get(Category::Video).streaming_threshold, 10 * 1024 * 1024);
    assert_eq!(profiles.get(Category::Video).memory_multiplier, 2.0);
    assert_eq!(profiles.get(Category::Image).memory_multiplier, 2.5);
    assert_eq!(profiles.get(Category::Image).max_concurrent, 3);

    Ok(())
}

#[test]
fn test_empty_file_is_default() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("empty.json");
    fs::write(&config_path, "{}")?;

    let config = SchedulerConfig::from_json_file(&config_path)?;
    assert_eq!(config, SchedulerConfig::default());
    Ok(())
}

#[test]
fn test_malformed_file_is_json_error() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("broken.json");
    fs::write(&config_path, "{ not json").unwrap();

    let result = SchedulerConfig::from_json_file(&config_path);
    assert!(matches!(result, Err(CoreError::Json(_))));
}

#[test]
fn test_invalid_profile_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("invalid.json");
    fs::write(
        &config_path,
        r#"{ "profiles": { "audio": { "max_concurrent": 0 } } }"#,
    )?;

    let config = SchedulerConfig::from_json_file(&config_path)?;
    assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    Ok(())
}

#[test]
fn test_builder_layers_on_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("squash.json");
    fs::write(
        &config_path,
        r#"{ "global_max_concurrent": 4, "profiles": { "document": { "max_concurrent": 2 } } }"#,
    )?;

    let config = SchedulerConfigBuilder::from_config(SchedulerConfig::from_json_file(&config_path)?)
        .global_max_concurrent(1)
        .profile(
            Category::Document,
            ProfileOverride {
                chunk_size_multiplier: Some(0.5),
                ..ProfileOverride::default()
            },
        )
        .build()?;

    assert_eq!(config.global_max_concurrent, Some(1));
    let document = config.profile_registry()?.get(Category::Document);
    assert_eq!(document.max_concurrent, 2);
    assert_eq!(document.chunk_size_multiplier, 0.5);
    Ok(())
}
