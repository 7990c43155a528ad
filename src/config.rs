//! Engine configuration
//!
//! Plain parameters with defaults, loadable from YAML. Every section and field
//! is optional in the file; missing values fall back to `Default`.
//!
//! ```yaml
//! traversal:
//!   max_depth: 12
//! identity:
//!   suffix_len: 8
//! analytics:
//!   z_threshold: 2.5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming a YAML config file
pub const CONFIG_ENV_VAR: &str = "OWNERSHIP_ENGINE_CONFIG";

/// Largest suffix whose base-36 range still fits a 64-bit hash
pub const MAX_SUFFIX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub traversal: TraversalConfig,
    pub identity: IdentityConfig,
    pub analytics: AnalyticsConfig,
}

/// Options for relation walks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Maximum hops from the root before a walk is truncated
    pub max_depth: u32,
    /// Fetch each hop with one `*_of_any` query instead of concurrent point lookups
    pub batch_lookups: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            batch_lookups: false,
        }
    }
}

/// Shape of derived identities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Width of the base-36 hash suffix
    pub suffix_len: usize,
    /// Maximum characters kept from the cleaned name
    pub max_name_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            suffix_len: 6,
            max_name_len: 40,
        }
    }
}

/// Thresholds for concentration banding and anomaly rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub z_threshold: f64,
    /// HHI at or above this is moderately concentrated
    pub hhi_moderate: f64,
    /// HHI above this is concentrated; equal to it is still moderate
    pub hhi_concentrated: f64,
    pub gini_moderate: f64,
    pub gini_high: f64,
    /// Known shares summing below this are incomplete
    pub incomplete_below: f64,
    /// Known shares summing above this are double-counted
    pub overlap_above: f64,
    /// Chain depth (ownership layers) flagged as complex
    pub complex_depth: u32,
    /// More ultimate parents than this at the deepest layer is fragmented
    pub fragmented_parents: usize,
    /// Lower-cased status values treated as operational limbo
    pub limbo_statuses: Vec<String>,
    /// Status substring marking an inferred (stale) status
    pub inferred_marker: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            hhi_moderate: 1500.0,
            hhi_concentrated: 2500.0,
            gini_moderate: 0.3,
            gini_high: 0.6,
            incomplete_below: 90.0,
            overlap_above: 105.0,
            complex_depth: 5,
            fragmented_parents: 3,
            limbo_statuses: vec!["shelved".into(), "mothballed".into()],
            inferred_marker: "inferred".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Explicit path, else `OWNERSHIP_ENGINE_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_yaml_file(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(env_path) if !env_path.trim().is_empty() => {
                tracing::debug!(path = %env_path, "Loading engine config from environment");
                Self::from_yaml_file(env_path.trim())
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traversal.max_depth == 0 {
            return Err(ConfigError::invalid("traversal.max_depth", "must be > 0"));
        }
        if self.identity.suffix_len == 0 || self.identity.suffix_len > MAX_SUFFIX_LEN {
            return Err(ConfigError::invalid(
                "identity.suffix_len",
                format!("must be between 1 and {}", MAX_SUFFIX_LEN),
            ));
        }
        if self.identity.max_name_len == 0 {
            return Err(ConfigError::invalid("identity.max_name_len", "must be > 0"));
        }
        let analytics = &self.analytics;
        if !(analytics.z_threshold > 0.0) {
            return Err(ConfigError::invalid("analytics.z_threshold", "must be > 0"));
        }
        if analytics.hhi_moderate > analytics.hhi_concentrated {
            return Err(ConfigError::invalid(
                "analytics.hhi_moderate",
                "must not exceed hhi_concentrated",
            ));
        }
        if analytics.gini_moderate > analytics.gini_high {
            return Err(ConfigError::invalid(
                "analytics.gini_moderate",
                "must not exceed gini_high",
            ));
        }
        if analytics.incomplete_below > analytics.overlap_above {
            return Err(ConfigError::invalid(
                "analytics.incomplete_below",
                "must not exceed overlap_above",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.traversal.max_depth, 25);
        assert_eq!(config.identity.suffix_len, 6);
        assert_eq!(config.identity.max_name_len, 40);
        assert_eq!(config.analytics.z_threshold, 2.0);
        assert_eq!(config.analytics.hhi_moderate, 1500.0);
        assert_eq!(config.analytics.hhi_concentrated, 2500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str(
            r#"
traversal:
  max_depth: 8
analytics:
  z_threshold: 3.0
"#,
        )
        .unwrap();
        assert_eq!(config.traversal.max_depth, 8);
        assert_eq!(config.analytics.z_threshold, 3.0);
        assert_eq!(config.analytics.overlap_above, 105.0);
        assert_eq!(config.identity, IdentityConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_yaml_str("identity:\n  suffix_len: 13\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "identity.suffix_len",
                ..
            }
        ));

        let err = EngineConfig::from_yaml_str("traversal:\n  max_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = EngineConfig::from_yaml_str(
            "analytics:\n  hhi_moderate: 3000\n  hhi_concentrated: 2000\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "identity:\n  max_name_len: 20").unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.identity.max_name_len, 20);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = EngineConfig::from_yaml_file("/nonexistent/engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
