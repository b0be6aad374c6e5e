use anyhow::{Context, Result, ensure};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::params::ConsoleParams;

const APP_DIR: &str = "analog-console";
const SETTINGS_FILENAME: &str = "settings.json";

/// A flat console parameter set plus the block size a host should use,
/// persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub block_size: usize,
    pub params: ConsoleParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size: 512,
            params: ConsoleParams::default(),
        }
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "------------------------------")?;
        writeln!(f, "Block Size: {}", self.block_size)?;
        write!(f, "{}", self.params)
    }
}

impl Settings {
    /// Read settings from `path`, or return defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        ensure!(settings.block_size > 0, "block_size must be at least one frame");

        debug!("Loaded settings from {}", path.display());
        Ok(Self {
            params: settings.params.sanitized(),
            ..settings
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir).join(APP_DIR).join(SETTINGS_FILENAME)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join(APP_DIR)
                .join(SETTINGS_FILENAME)
        } else {
            PathBuf::from(".").join(SETTINGS_FILENAME)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SaturationMode;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);

        let settings = Settings {
            block_size: 64,
            params: ConsoleParams {
                drive_db: 9.5,
                saturation_mode: SaturationMode::Ldr,
                compressor_enabled: true,
                limiter_enabled: true,
                mix: 0.4,
                ..ConsoleParams::default()
            },
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn loaded_values_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, r#"{ "params": { "crosstalk": 4.0, "output_gain_db": 60.0 } }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.block_size, Settings::default().block_size);
        assert_eq!(settings.params.crosstalk, 1.0);
        assert_eq!(settings.params.output_gain_db, crate::params::MAX_OUTPUT_DB);
    }

    #[test]
    fn malformed_documents_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);

        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());

        fs::write(&path, r#"{ "block_size": 0 }"#).unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
