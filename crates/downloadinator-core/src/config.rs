//! Application configuration management.
//!
//! Recognized options: the dispatch policy (`parallel_downloads`, off by
//! default), the output container for fetched audio, and the root
//! directory album folders are created under.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::queue::DispatchPolicy;
use crate::tags::OutputContainer;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Dispatch every track concurrently instead of one at a time.
    #[serde(default)]
    pub parallel_downloads: bool,
    /// Container (and tag schema) for downloaded audio.
    #[serde(default)]
    pub output_container: OutputContainer,
    /// Directory album folders are created under.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            parallel_downloads: false,
            output_container: OutputContainer::default(),
            output_root: default_output_root(),
        }
    }
}

impl AppConfig {
    /// The dispatch policy selected by this configuration.
    #[must_use]
    pub const fn dispatch_policy(&self) -> DispatchPolicy {
        if self.parallel_downloads {
            DispatchPolicy::Parallel
        } else {
            DispatchPolicy::Sequential
        }
    }

    /// Load configuration from disk, or create defaults if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        if !config_path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save() {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::Configuration(format!(
                "failed to read {}: {e}",
                config_path.display()
            ))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("failed to parse config file: {e}")))?;

        info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        let config_path = config_file_path();

        if let Some(parent) = config_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryCreation {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content).map_err(|e| {
            Error::Configuration(format!(
                "failed to write {}: {e}",
                config_path.display()
            ))
        })?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }
}

/// Default directory album folders are created under.
#[must_use]
pub fn default_output_root() -> PathBuf {
    dirs::audio_dir()
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("downloadinator")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.parallel_downloads);
        assert_eq!(config.output_container, OutputContainer::Mp3);
        assert_eq!(config.dispatch_policy(), DispatchPolicy::Sequential);
    }

    #[test]
    fn test_parallel_selects_policy() {
        let config = AppConfig {
            parallel_downloads: true,
            ..Default::default()
        };
        assert_eq!(config.dispatch_policy(), DispatchPolicy::Parallel);
    }

    #[test]
    fn test_round_trip_with_missing_keys() {
        let parsed: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(!parsed.parallel_downloads);
        assert_eq!(parsed.output_container, OutputContainer::Mp3);

        let full: AppConfig = serde_json::from_str(
            r#"{"parallel_downloads": true, "output_container": "m4a", "output_root": "/music"}"#,
        )
        .unwrap();
        assert!(full.parallel_downloads);
        assert_eq!(full.output_container, OutputContainer::M4a);
        assert_eq!(full.output_root, PathBuf::from("/music"));

        let json = serde_json::to_string(&full).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, full);
    }
}
