//! Engine Configuration Module
//!
//! Provides engine configuration loaded from TOML files, so geofence
//! capacity, trigger radius, cooldown, special-number probability and
//! history cap are operator-tunable rather than hard-coded.
//!
//! ## Loading Order
//!
//! 1. `LOTTO_ALERT_CONFIG` environment variable (path to TOML file)
//! 2. `lotto_alert.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`EngineConfig`] is handed to each component explicitly;
//! there is no process-wide config singleton.

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
