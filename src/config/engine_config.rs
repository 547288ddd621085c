//! Engine Configuration - every proximity/notification tunable as a TOML value
//!
//! Each struct implements `Default` with the values observed in production,
//! so running without a config file behaves exactly like the shipped app.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LOTTO_ALERT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "lotto_alert.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the proximity engine.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$LOTTO_ALERT_CONFIG` env var
/// 2. `./lotto_alert.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Region monitoring limits
    #[serde(default)]
    pub geofence: GeofenceConfig,

    /// Cooldown and delivery timing
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Number generation
    #[serde(default)]
    pub recommendation: RecommendationConfig,

    /// Recommendation history persistence
    #[serde(default)]
    pub history: HistoryConfig,

    /// Actor channel sizing
    #[serde(default)]
    pub engine: EngineRuntimeConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./lotto_alert.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        for w in super::validation::plausibility_warnings(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Reject values that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.geofence.capacity == 0 {
            errors.push("geofence.capacity must be > 0".to_string());
        }
        let r = self.geofence.trigger_radius_meters;
        if !r.is_finite() || r <= 0.0 {
            errors.push(format!(
                "geofence.trigger_radius_meters ({r}) must be a finite value > 0"
            ));
        }
        if self.notification.min_interval_secs > defaults::MAX_NOTIFICATION_INTERVAL_SECS {
            errors.push(format!(
                "notification.min_interval_secs ({}) must be <= {}",
                self.notification.min_interval_secs,
                defaults::MAX_NOTIFICATION_INTERVAL_SECS
            ));
        }
        let t = self.notification.delivery_timeout_secs;
        if t == 0 || t > defaults::MAX_DELIVERY_TIMEOUT_SECS {
            errors.push(format!(
                "notification.delivery_timeout_secs ({t}) must be within [1, {}]",
                defaults::MAX_DELIVERY_TIMEOUT_SECS
            ));
        }
        let p = self.recommendation.special_probability;
        if !(0.0..=1.0).contains(&p) {
            errors.push(format!(
                "recommendation.special_probability ({p}) must be within [0, 1]"
            ));
        }
        if self.history.max_size == 0 {
            errors.push("history.max_size must be > 0".to_string());
        }
        if self.history.key.is_empty() {
            errors.push("history.key must not be empty".to_string());
        }
        if self.engine.command_buffer == 0 {
            errors.push("engine.command_buffer must be > 0".to_string());
        }
        if self.engine.outcome_buffer == 0 {
            errors.push("engine.outcome_buffer must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Geofence
// ============================================================================

/// Region monitoring limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Maximum simultaneously watched stores.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Distance at which a store counts as entered (meters).
    #[serde(default = "default_trigger_radius")]
    pub trigger_radius_meters: f64,
}

const fn default_capacity() -> usize { defaults::GEOFENCE_CAPACITY }
const fn default_trigger_radius() -> f64 { defaults::TRIGGER_RADIUS_METERS }

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            trigger_radius_meters: default_trigger_radius(),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Cooldown and delivery timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum seconds between notifications for one store.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Seconds before an unanswered delivery counts as failed.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
}

const fn default_min_interval() -> u64 { defaults::MIN_NOTIFICATION_INTERVAL_SECS }
const fn default_delivery_timeout() -> u64 { defaults::DELIVERY_TIMEOUT_SECS }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            delivery_timeout_secs: default_delivery_timeout(),
        }
    }
}

impl NotificationConfig {
    pub fn min_interval(&self) -> chrono::Duration {
        let secs = self
            .min_interval_secs
            .min(defaults::MAX_NOTIFICATION_INTERVAL_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
    }

    pub const fn delivery_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.delivery_timeout_secs)
    }
}

// ============================================================================
// Recommendation
// ============================================================================

/// Number generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Chance that all six numbers are marked special.
    #[serde(default = "default_special_probability")]
    pub special_probability: f64,
}

const fn default_special_probability() -> f64 { defaults::SPECIAL_PROBABILITY }

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            special_probability: default_special_probability(),
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// Recommendation history persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum stored recommendations (newest kept).
    #[serde(default = "default_history_max")]
    pub max_size: usize,

    /// sled database directory.
    #[serde(default = "default_history_path")]
    pub db_path: PathBuf,

    /// Key holding the serialized list.
    #[serde(default = "default_history_key")]
    pub key: String,
}

const fn default_history_max() -> usize { defaults::HISTORY_MAX_SIZE }
fn default_history_path() -> PathBuf { PathBuf::from(defaults::HISTORY_DB_PATH) }
fn default_history_key() -> String { defaults::HISTORY_KEY.to_string() }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_history_max(),
            db_path: default_history_path(),
            key: default_history_key(),
        }
    }
}

// ============================================================================
// Engine Runtime
// ============================================================================

/// Actor channel sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRuntimeConfig {
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    #[serde(default = "default_outcome_buffer")]
    pub outcome_buffer: usize,
}

const fn default_command_buffer() -> usize { defaults::ENGINE_COMMAND_BUFFER }
const fn default_outcome_buffer() -> usize { defaults::ENGINE_OUTCOME_BUFFER }

impl Default for EngineRuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            outcome_buffer: default_outcome_buffer(),
        }
    }
}
