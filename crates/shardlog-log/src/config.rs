use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardlog_types::{AddressMapper, Capacity, DEFAULT_CAPACITY, MSG_COLLECTION};

/// Errors loading or validating a [`LogConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Deployment settings for a message log.
///
/// ```toml
/// capacity = 5000
/// op_timeout_ms = 5000
/// collection = "msg"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Slots per shard. Fixed for the lifetime of the stored data.
    pub capacity: u64,
    /// Deadline applied to each store round-trip.
    pub op_timeout_ms: u64,
    /// Collection (directory) holding shard documents.
    pub collection: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            op_timeout_ms: 5_000,
            collection: MSG_COLLECTION.to_owned(),
        }
    }
}

impl LogConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be positive".into()));
        }
        if self.op_timeout_ms == 0 {
            return Err(ConfigError::Invalid("op_timeout_ms must be positive".into()));
        }
        if self.collection.is_empty() {
            return Err(ConfigError::Invalid("collection must not be empty".into()));
        }
        Ok(())
    }

    pub fn capacity(&self) -> Result<Capacity, ConfigError> {
        Capacity::new(self.capacity).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn mapper(&self) -> Result<AddressMapper, ConfigError> {
        Ok(AddressMapper::new(self.capacity()?))
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LogConfig::default();
        assert_eq!(c.capacity, 5000);
        assert_eq!(c.op_timeout(), Duration::from_secs(5));
        assert_eq!(c.collection, "msg");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = LogConfig::from_toml_str("capacity = 3").unwrap();
        assert_eq!(c.capacity, 3);
        assert_eq!(c.op_timeout_ms, 5_000);
        assert_eq!(c.mapper().unwrap().capacity().get(), 3);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            LogConfig::from_toml_str("capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LogConfig::from_toml_str("op_timeout_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LogConfig::from_toml_str("collection = \"\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            LogConfig::from_toml_str("capacty = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shardlog.toml");
        std::fs::write(&path, "collection = \"archive\"\nop_timeout_ms = 250\n").unwrap();
        let c = LogConfig::load(&path).unwrap();
        assert_eq!(c.collection, "archive");
        assert_eq!(c.op_timeout(), Duration::from_millis(250));

        let missing = LogConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
