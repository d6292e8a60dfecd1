//! Configuration management for the parley client

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Parley client configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Dialogue service endpoints
    pub server: ServerConfig,

    /// Voice pipeline tuning
    pub voice: VoiceConfig,
}

/// Dialogue service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL for the transcription/generation/clip endpoints
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Voice pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceConfig {
    /// Smoothed amplitude below or at this level counts as silence
    pub silence_threshold: f32,

    /// How long the user must stay silent before their turn ends (ms)
    pub silence_delay_ms: u64,

    /// Number of recent frames in the amplitude smoothing window
    pub amplitude_window_frames: usize,

    /// Segments shorter than this are discarded as noise (seconds)
    pub min_segment_secs: f32,

    /// Hard cap on a single segment's length (seconds)
    pub max_segment_secs: f32,

    /// Delay between clip fetch attempts while the clip is not ready (ms)
    pub clip_retry_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.02,
            silence_delay_ms: 3000,
            amplitude_window_frames: 180,
            min_segment_secs: 1.0,
            max_segment_secs: 10.0,
            clip_retry_ms: 250,
        }
    }
}

/// Return the default config file path (`~/.config/omni/parley/config.toml`
/// on Linux), or `None` if no home directory can be determined
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "omni", "omni")
        .map(|d| d.config_dir().join("parley").join("config.toml"))
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file is not an error; defaults apply. The
    /// `PARLEY_SERVER_URL` environment variable overrides `server.base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if an existing config file cannot be read or parsed
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit file path
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply environment-variable overrides
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PARLEY_SERVER_URL") {
            self.server.base_url = url;
        }
    }
}
