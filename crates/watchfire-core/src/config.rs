//! Store option loading and validation.
//!
//! [`RegionOptions`] controls which provider services a store starts. The
//! flags default to everything enabled and can be loaded from a TOML file for
//! deployments that configure regions declaratively.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading options from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options file could not be read.
    #[error("Failed to read options from {path}: {source}")]
    ReadError {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The options file exists but is not valid TOML for [`RegionOptions`].
    #[error("Failed to parse options: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Which provider services a [`RegionStore`](crate::store::RegionStore)
/// starts at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOptions {
    /// Start region membership monitoring.
    #[serde(default = "default_enabled")]
    pub monitoring_enabled: bool,

    /// Start beacon ranging.
    #[serde(default = "default_enabled")]
    pub ranging_enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            ranging_enabled: true,
        }
    }
}

impl RegionOptions {
    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load options from the platform config path, falling back to defaults
    /// when no file exists.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] only when a file exists but cannot be read
    /// or parsed; a missing file is not an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// The options file location for the current platform.
    #[must_use]
    pub fn config_path() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/watchfire/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "watchfire")
                .map(|dirs| dirs.config_dir().join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("./watchfire.toml"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_enable_everything() {
        let options = RegionOptions::default();
        assert!(options.monitoring_enabled);
        assert!(options.ranging_enabled);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "monitoring_enabled = false").unwrap();
        writeln!(file, "ranging_enabled = true").unwrap();

        let options = RegionOptions::load_from(file.path()).unwrap();
        assert!(!options.monitoring_enabled);
        assert!(options.ranging_enabled);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "monitoring_enabled = false").unwrap();

        let options = RegionOptions::load_from(file.path()).unwrap();
        assert!(!options.monitoring_enabled);
        assert!(options.ranging_enabled);
    }

    #[test]
    fn test_mistyped_flag_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "monitoring_enabled = 1").unwrap();

        let err = RegionOptions::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = RegionOptions::load_from(Path::new("/nonexistent/watchfire.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let options = RegionOptions {
            monitoring_enabled: false,
            ranging_enabled: false,
        };
        let serialized = toml::to_string(&options).unwrap();
        let parsed: RegionOptions = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, options);
    }
}
