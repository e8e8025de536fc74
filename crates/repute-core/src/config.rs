//! Engine configuration parsing and validation.
//!
//! Configuration is TOML, loaded into [`EngineConfig`] with serde defaults
//! for every field so an empty file is a valid configuration. Validation is
//! fail-closed: nonsense values (a zero batch cap, a zero cache TTL) are
//! rejected at load time rather than producing surprising runtime behavior.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReputationError;
use crate::policy::DEFAULT_AT_RISK_BUFFER;

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TTL for cached custom weight tables, in seconds.
    #[serde(default = "default_weight_cache_ttl_secs")]
    pub weight_cache_ttl_secs: u64,

    /// Maximum number of events accepted in one batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Default at-risk buffer applied to communities without an explicit
    /// policy configuration.
    #[serde(default = "default_at_risk_buffer")]
    pub at_risk_buffer: i64,

    /// How long a storage operation may wait on a busy database before the
    /// caller sees a retryable `StorageUnavailable`, in milliseconds.
    #[serde(default = "default_storage_busy_timeout_ms")]
    pub storage_busy_timeout_ms: u64,

    /// Whether moderation events (warn/timeout/kick/ban) count toward the
    /// cross-community global score.
    ///
    /// Global reputation implies cross-community trust; one community's
    /// moderation judgment may or may not belong in it. Defaults to `true`,
    /// matching the community-scoped weighting.
    #[serde(default = "default_global_counts_moderation")]
    pub global_counts_moderation: bool,
}

const fn default_weight_cache_ttl_secs() -> u64 {
    300
}

const fn default_max_batch_size() -> usize {
    1000
}

const fn default_at_risk_buffer() -> i64 {
    DEFAULT_AT_RISK_BUFFER
}

const fn default_storage_busy_timeout_ms() -> u64 {
    5000
}

const fn default_global_counts_moderation() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weight_cache_ttl_secs: default_weight_cache_ttl_secs(),
            max_batch_size: default_max_batch_size(),
            at_risk_buffer: default_at_risk_buffer(),
            storage_busy_timeout_ms: default_storage_busy_timeout_ms(),
            global_counts_moderation: default_global_counts_moderation(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::InvalidConfig`] if the file cannot be
    /// read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ReputationError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ReputationError::InvalidConfig {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::InvalidConfig`] on parse or validation
    /// failure.
    pub fn from_toml(content: &str) -> Result<Self, ReputationError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ReputationError::InvalidConfig {
                message: format!("parse error: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::InvalidConfig`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ReputationError> {
        if self.weight_cache_ttl_secs == 0 {
            return Err(ReputationError::InvalidConfig {
                message: "weight_cache_ttl_secs must be > 0".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(ReputationError::InvalidConfig {
                message: "max_batch_size must be > 0".to_string(),
            });
        }
        if self.at_risk_buffer < 0 {
            return Err(ReputationError::InvalidConfig {
                message: format!("at_risk_buffer must be >= 0, got {}", self.at_risk_buffer),
            });
        }
        if self.storage_busy_timeout_ms == 0 {
            return Err(ReputationError::InvalidConfig {
                message: "storage_busy_timeout_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Weight cache TTL as a [`Duration`].
    #[must_use]
    pub const fn weight_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.weight_cache_ttl_secs)
    }

    /// Storage busy timeout as a [`Duration`].
    #[must_use]
    pub const fn storage_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml("").expect("empty config is valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.weight_cache_ttl_secs, 300);
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.at_risk_buffer, 50);
        assert!(config.global_counts_moderation);
    }

    #[test]
    fn partial_toml_overrides_selected_fields() {
        let config = EngineConfig::from_toml(
            "max_batch_size = 200\nglobal_counts_moderation = false\n",
        )
        .expect("valid config");
        assert_eq!(config.max_batch_size, 200);
        assert!(!config.global_counts_moderation);
        assert_eq!(config.weight_cache_ttl_secs, 300);
    }

    #[test]
    fn rejects_zero_batch_cap() {
        let err = EngineConfig::from_toml("max_batch_size = 0\n").unwrap_err();
        assert!(matches!(err, ReputationError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = EngineConfig::from_toml("weight_cache_ttl_secs = 0\n").unwrap_err();
        assert!(matches!(err, ReputationError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_unparseable_toml() {
        let err = EngineConfig::from_toml("max_batch_size = \"lots\"\n").unwrap_err();
        assert!(matches!(err, ReputationError::InvalidConfig { .. }));
    }
}
