use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    video::PadColor,
};

/// Main configuration for a collage run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Panel geometry and separators
    pub layout: LayoutConfig,

    /// Encoder settings
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.output.validate()?;
        Ok(())
    }
}

/// Panel layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Common panel height; smallest source height when unset
    pub target_height: Option<u32>,

    /// Width of the separator strip between adjacent panels
    pub pad_px: u32,

    /// Separator and filler color
    pub pad_color: PadColor,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            target_height: None,
            pad_px: 0,
            pad_color: PadColor::BLACK,
        }
    }
}

/// Output encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Fixed output frame rate; slowest source rate when unset
    pub force_fps: Option<f64>,

    /// Four-character code (`mp4v`, `avc1`, ...) or an ffmpeg encoder name
    pub codec: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            force_fps: None,
            codec: "mp4v".to_string(),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.is_empty() || self.codec.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "output.codec".to_string(),
                value: format!("{:?}", self.codec),
            }.into());
        }

        if let Some(fps) = self.force_fps {
            if !fps.is_finite() {
                return Err(ConfigError::InvalidValue {
                    key: "output.force_fps".to_string(),
                    value: fps.to_string(),
                }.into());
            }
        }

        Ok(())
    }
}
