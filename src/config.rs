//! Mixer settings, read from a JSON file in the user's config directory

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::device::AudioConfig;
use crate::error::ConfigError;

/// Fade applied when the sleep timer runs out
pub const DEFAULT_FADE_OUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Directory holding the loop files named in the catalog
    pub audio_dir: PathBuf,
    /// Output device name; the host default when absent
    pub output_device: Option<String>,
    pub fade_out_ms: u64,
    pub audio: AudioConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio"),
            output_device: None,
            fade_out_ms: DEFAULT_FADE_OUT_MS,
            audio: AudioConfig::default(),
        }
    }
}

impl MixerConfig {
    /// `<config dir>/soundpalette/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("soundpalette").join("config.json"))
    }

    /// Read and parse a settings file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            log::debug!("No config directory, using default settings");
            return Self::default();
        };

        if !path.exists() {
            log::debug!("No config at {:?}, using default settings", path);
            return Self::default();
        }

        match Self::from_file(&path) {
            Ok(config) => {
                log::info!("Loaded settings from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("{}, using default settings", e);
                Self::default()
            }
        }
    }
}
