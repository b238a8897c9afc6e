//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transfer: TransferSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Locations and limits of a transfer run
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSettings {
    /// Directory holding the destination `.dat` and `.rra` files
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Directory holding the CSV files exported from the old device
    #[serde(default = "default_import_dir")]
    pub import_dir: String,

    /// Logger configuration XML used to resolve device names
    #[serde(default = "default_names_file")]
    pub names_file: String,

    /// Last day (YYYY-mm-dd) whose samples are imported
    #[serde(default)]
    pub until: Option<String>,

    /// Compute merges without writing payload files
    #[serde(default)]
    pub dry_run: bool,
}

fn default_archive_dir() -> String {
    "/qmf/var/hcb_rrd".to_string()
}

fn default_import_dir() -> String {
    "/var/volatile/tmp/exports".to_string()
}

fn default_names_file() -> String {
    "/HCBv2/config/config_hcb_rrd.xml".to_string()
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            import_dir: default_import_dir(),
            names_file: default_names_file(),
            until: None,
            dry_run: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rrd-transfer").join("config.toml")),
            Some(PathBuf::from("/etc/rrd-transfer/config.toml")),
            Some(PathBuf::from("./rrd-transfer.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Transfer overrides
        if let Some(dir) = lookup("RRD_TRANSFER_ARCHIVE_DIR") {
            self.transfer.archive_dir = dir;
        }
        if let Some(dir) = lookup("RRD_TRANSFER_IMPORT_DIR") {
            self.transfer.import_dir = dir;
        }
        if let Some(file) = lookup("RRD_TRANSFER_NAMES") {
            self.transfer.names_file = file;
        }
        if let Some(until) = lookup("RRD_TRANSFER_UNTIL") {
            self.transfer.until = Some(until);
        }

        // Logging overrides
        if let Some(level) = lookup("RRD_TRANSFER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RRD_TRANSFER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# rrd-transfer Configuration
#
# Environment variables override these settings:
# - RRD_TRANSFER_ARCHIVE_DIR
# - RRD_TRANSFER_IMPORT_DIR
# - RRD_TRANSFER_NAMES
# - RRD_TRANSFER_UNTIL
# - RRD_TRANSFER_LOG_LEVEL
# - RRD_TRANSFER_LOG_FORMAT

[transfer]
# Directory with the new device's .dat and .rra files
archive_dir = "/qmf/var/hcb_rrd"

# Directory with the CSV files exported from the old device
import_dir = "/var/volatile/tmp/exports"

# Logger configuration used to resolve device names
names_file = "/HCBv2/config/config_hcb_rrd.xml"

# Import samples up to and including this day (YYYY-mm-dd)
# until = "2019-03-09"

# Compute merges without writing .rra files
dry_run = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/rrd-transfer.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.transfer.archive_dir, "/qmf/var/hcb_rrd");
        assert_eq!(config.transfer.until, None);
        assert!(!config.transfer.dry_run);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
[transfer]
import_dir = "/tmp/upload"
until = "2019-05-01"
"#,
        )
        .unwrap();
        assert_eq!(config.transfer.import_dir, "/tmp/upload");
        assert_eq!(config.transfer.until.as_deref(), Some("2019-05-01"));
        assert_eq!(config.transfer.names_file, "/HCBv2/config/config_hcb_rrd.xml");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RRD_TRANSFER_ARCHIVE_DIR", "/data/rrd"),
            ("RRD_TRANSFER_UNTIL", "2020-01-31"),
            ("RRD_TRANSFER_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.transfer.archive_dir, "/data/rrd");
        assert_eq!(config.transfer.until.as_deref(), Some("2020-01-31"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[transfer\n").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }
}
