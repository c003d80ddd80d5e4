// Application configuration
// Logging is on by default only in debug builds

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

/// Query parameter carrying the streamer id in a sharing link
pub const DEFAULT_LINK_PARAM: &str = "otherPeerId";

/// Role prefix of every id minted by this application
pub const DEFAULT_ID_PREFIX: &str = "RemoteDesktop";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `"deskshare_lib=debug"`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: LOGGING_ENABLED,
            filter: "info".into(),
        }
    }
}

/// Display capture constraints handed to the media collaborator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CapturePreset {
    pub label: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: u32,
    pub audio: bool,
}

impl CapturePreset {
    /// Unconstrained video plus audio, used when no preset matches
    pub fn fallback() -> Self {
        Self {
            label: "auto".into(),
            width: None,
            height: None,
            frame_rate: 30,
            audio: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub id_prefix: String,
    pub link_param: String,
    pub capture_presets: Vec<CapturePreset>,
    pub default_preset: usize,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_ID_PREFIX.into(),
            link_param: DEFAULT_LINK_PARAM.into(),
            capture_presets: vec![
                CapturePreset {
                    label: "1080p".into(),
                    width: None,
                    height: Some(1080),
                    frame_rate: 60,
                    audio: true,
                },
                CapturePreset {
                    label: "2k".into(),
                    width: Some(2560),
                    height: None,
                    frame_rate: 60,
                    audio: true,
                },
                CapturePreset {
                    label: "4k".into(),
                    width: Some(4500),
                    height: None,
                    frame_rate: 60,
                    audio: true,
                },
            ],
            default_preset: 0,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_prefix.is_empty() {
            return Err(Error::Config("id_prefix cannot be empty".into()));
        }
        if self.id_prefix.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "id_prefix '{}' must not end in a digit",
                self.id_prefix
            )));
        }
        if self.link_param.is_empty() {
            return Err(Error::Config("link_param cannot be empty".into()));
        }
        if self.capture_presets.is_empty() {
            return Err(Error::Config("at least one capture preset is required".into()));
        }
        if self.default_preset >= self.capture_presets.len() {
            return Err(Error::Config(format!(
                "default_preset {} out of range ({} presets)",
                self.default_preset,
                self.capture_presets.len()
            )));
        }
        Ok(())
    }

    /// Preset by index, or the unconstrained fallback
    pub fn preset(&self, index: usize) -> CapturePreset {
        self.capture_presets
            .get(index)
            .cloned()
            .unwrap_or_else(CapturePreset::fallback)
    }
}
