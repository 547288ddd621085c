//! Config Validation Tests
//!
//! Typo detection and range validation for `lotto_alert.toml`, exercised
//! through the public config API independently from the engine.

use lotto_alert::config::validation::{
    known_config_keys, plausibility_warnings, suggest_correction, validate_unknown_keys,
};
use lotto_alert::config::{ConfigError, EngineConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_notification_section_warns_with_suggestion() {
    let toml_str = r#"
[notification]
min_intervall_secs = 300
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("min_intervall_secs"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("notification.min_interval_secs")
    );
}

#[test]
fn typo_in_section_name_warns() {
    let warnings = validate_unknown_keys("[geofense]\ncapacity = 10\n");
    assert!(!warnings.is_empty());
    assert!(warnings
        .iter()
        .any(|w| w.suggestion.as_deref() == Some("geofence")));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[geofence]
capacity = 20
trigger_radius_meters = 1000.0

[notification]
min_interval_secs = 3600
delivery_timeout_secs = 30

[recommendation]
special_probability = 0.6

[history]
max_size = 50
db_path = "./data/recommendations.db"
key = "lottoRecommendations"

[engine]
command_buffer = 64
outcome_buffer = 64
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config: EngineConfig = toml::from_str(toml_str).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn far_off_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[history]\ncompletely_unrelated = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn suggestion_uses_known_keys() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("history.max_sise", &known).as_deref(),
        Some("history.max_size")
    );
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn default_config_is_plausible() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert!(plausibility_warnings(&config).is_empty());
}

#[test]
fn oversized_interval_rejected() {
    let mut config = EngineConfig::default();
    config.notification.min_interval_secs = u64::MAX;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn seconds_scale_interval_is_valid_but_flagged() {
    let mut config = EngineConfig::default();
    config.notification.min_interval_secs = 1;
    assert!(config.validate().is_ok());
    let warnings = plausibility_warnings(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "notification.min_interval_secs");
}

#[test]
fn save_and_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lotto_alert.toml");
    let mut config = EngineConfig::default();
    config.geofence.capacity = 12;
    config.recommendation.special_probability = 0.6;
    config.save_to_file(&path).unwrap();

    let loaded = EngineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.geofence.capacity, 12);
    assert!((loaded.recommendation.special_probability - 0.6).abs() < f64::EPSILON);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = EngineConfig::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(..))));
}

#[test]
fn malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[geofence\ncapacity = ").unwrap();
    assert!(matches!(
        EngineConfig::load_from_file(&path),
        Err(ConfigError::Parse(..))
    ));
}
