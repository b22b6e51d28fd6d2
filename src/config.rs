use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable naming a TOML file for [`RegistryConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "METATYPE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Initial capacity of the type table.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Log each type's computed layout at debug level on registration.
    #[serde(default = "default_false")]
    pub log_type_info: bool,

    /// Warn when a type is unregistered, or a default class is destroyed,
    /// while references remain.
    #[serde(default = "default_true")]
    pub warn_on_live_refs: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_capacity() -> usize {
    64
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            log_type_info: false,
            warn_on_live_refs: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from the file named by `METATYPE_CONFIG`, if set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)).map(Some),
            None => Ok(None),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.capacity, 64);
        assert!(!config.log_type_info);
        assert!(config.warn_on_live_refs);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = RegistryConfig::from_toml_str(
            r#"
            log_type_info = true

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert!(config.log_type_info);
        assert_eq!(config.capacity, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capacity = 256\nwarn_on_live_refs = false").unwrap();

        let config = RegistryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.capacity, 256);
        assert!(!config.warn_on_live_refs);
    }

    #[test]
    fn test_bad_toml() {
        let err = RegistryConfig::from_toml_str("capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RegistryConfig::from_file(Path::new("/nonexistent/metatype.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut config = RegistryConfig::default();
        config.logging.format = LogFormat::Pretty;
        let text = config.to_toml_string().unwrap();
        assert_eq!(RegistryConfig::from_toml_str(&text).unwrap(), config);
    }
}
