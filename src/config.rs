//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via STMGR_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by `main`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stmgr_core::entity::DEFAULT_STATE_PROPERTY;
use stmgr_core::Wildcard;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog configuration.
    pub catalog: CatalogConfig,
    /// Output configuration.
    pub output: OutputConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("STMGR_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.catalog.apply_env_overrides();
        self.output.apply_env_overrides();
        self.logging.apply_env_overrides();
        self.engine.apply_env_overrides();
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.state_property.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.state_property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog file (YAML or JSON).
    pub path: Option<PathBuf>,
}

impl CatalogConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STMGR_CATALOG") {
            if !path.is_empty() {
                self.path = Some(PathBuf::from(path));
            }
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ConfigError::ValidationError(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Colorize text output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl OutputConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(format) = std::env::var("STMGR_FORMAT") {
            match format.parse() {
                Ok(parsed) => self.format = parsed,
                Err(e) => eprintln!("Ignoring STMGR_FORMAT: {}", e),
            }
        }

        if let Ok(color) = std::env::var("STMGR_COLOR") {
            self.color = color == "1" || color.to_lowercase() == "true";
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("STMGR_LOG_LEVEL") {
            if !level.is_empty() {
                self.level = level;
            }
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity property holding the current state.
    pub state_property: String,
    /// Allow wildcard (`*`) transitions when computing the next state.
    pub wildcard: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_property: DEFAULT_STATE_PROPERTY.to_string(),
            wildcard: true,
        }
    }
}

impl EngineConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(property) = std::env::var("STMGR_STATE_PROPERTY") {
            if !property.is_empty() {
                self.state_property = property;
            }
        }

        if let Ok(wildcard) = std::env::var("STMGR_WILDCARD") {
            self.wildcard = wildcard == "1" || wildcard.to_lowercase() == "true";
        }
    }

    pub fn wildcard(&self) -> Wildcard {
        if self.wildcard {
            Wildcard::Allow
        } else {
            Wildcard::Deny
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.catalog.path.is_none());
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.color);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.engine.state_property, "status");
        assert_eq!(config.engine.wildcard(), Wildcard::Allow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "catalog:\n  path: /tmp/catalog.yaml\nengine:\n  wildcard: false\noutput:\n  format: json"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.catalog.path, Some(PathBuf::from("/tmp/catalog.yaml")));
        assert_eq!(config.engine.wildcard(), Wildcard::Deny);
        assert_eq!(config.engine.state_property, "status");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.color);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "output: [unclosed").unwrap();
        assert!(matches!(
            Config::from_file(&bad),
            Err(ConfigError::ParseError(..))
        ));
    }

    #[test]
    fn test_validate_state_property() {
        let mut config = Config::default();
        config.engine.state_property = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.engine.state_property, config.engine.state_property);
        assert_eq!(parsed.output.format, config.output.format);
    }
}
