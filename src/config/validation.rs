//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for EngineConfig.
///
/// Any new field added to EngineConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [geofence]
        "geofence",
        "geofence.capacity",
        "geofence.trigger_radius_meters",
        // [notification]
        "notification",
        "notification.min_interval_secs",
        "notification.delivery_timeout_secs",
        // [recommendation]
        "recommendation",
        "recommendation.special_probability",
        // [history]
        "history",
        "history.max_size",
        "history.db_path",
        "history.key",
        // [engine]
        "engine",
        "engine.command_buffer",
        "engine.outcome_buffer",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        // Tie-break on the key so suggestions are stable across runs
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Values that are legal but probably a mistake.
pub fn plausibility_warnings(config: &super::EngineConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let r = config.geofence.trigger_radius_meters;
    if r < 50.0 || r > 50_000.0 {
        warnings.push(ValidationWarning {
            field: "geofence.trigger_radius_meters".to_string(),
            message: format!("trigger_radius_meters = {r:.0} is outside typical range (50-50000 m)"),
            suggestion: None,
        });
    }

    if config.notification.min_interval_secs < 5 {
        warnings.push(ValidationWarning {
            field: "notification.min_interval_secs".to_string(),
            message: format!(
                "min_interval_secs = {} will notify on nearly every entry",
                config.notification.min_interval_secs
            ),
            suggestion: None,
        });
    }

    if config.history.max_size > 1_000 {
        warnings.push(ValidationWarning {
            field: "history.max_size".to_string(),
            message: format!(
                "history.max_size = {} rewrites a large list on every append",
                config.history.max_size
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("capcity", "capacity"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [geofence]
            capacity = 10
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"geofence".to_string()));
        assert!(keys.contains(&"geofence.capacity".to_string()));
    }

    #[test]
    fn test_unknown_key_with_suggestion() {
        let warnings = validate_unknown_keys("[geofence]\ncapcity = 10\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "geofence.capcity");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("geofence.capacity"));
    }

    #[test]
    fn test_known_keys_produce_no_warnings() {
        let raw = "[notification]\nmin_interval_secs = 60\n[history]\nmax_size = 10\n";
        assert!(validate_unknown_keys(raw).is_empty());
    }

    #[test]
    fn test_plausibility() {
        let mut config = crate::config::EngineConfig::default();
        assert!(plausibility_warnings(&config).is_empty());
        config.notification.min_interval_secs = 1;
        config.geofence.trigger_radius_meters = 10.0;
        assert_eq!(plausibility_warnings(&config).len(), 2);
    }
}
