//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShotcraftError, ShotcraftResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where exports are written when no output is given.
    pub output_dir: PathBuf,

    /// Default export settings.
    pub export: ExportDefaults,

    /// Font resolution for caption rendering.
    pub fonts: FontConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Still image format ("png" or "jpeg").
    pub image_format: String,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// Video encoder settings.
    pub video: VideoEncodeSettings,
}

/// Settings for the delivery video codec (H.264 in MP4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEncodeSettings {
    /// Constant rate factor passed to the encoder.
    pub crf: u8,

    /// Encoder speed preset.
    pub preset: String,

    /// Bounded queue depth between the pumps and the writer.
    pub channel_capacity: usize,
}

/// Where caption fonts come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Directories scanned for files matching the screen's font family.
    pub search_dirs: Vec<PathBuf>,

    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub italic: Option<PathBuf>,
    pub bold_italic: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shotcraft=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            export: ExportDefaults::default(),
            fonts: FontConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            image_format: "png".to_string(),
            jpeg_quality: 90,
            video: VideoEncodeSettings::default(),
        }
    }
}

impl Default for VideoEncodeSettings {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "medium".to_string(),
            channel_capacity: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// Runs before logging is set up, so a load failure comes back as a
    /// warning for the caller to log.
    pub fn load() -> (Self, Option<String>) {
        Self::load_or_default(&config_file_path())
    }

    /// Load `path` if it exists; a missing file means defaults without a warning.
    pub fn load_or_default(path: &Path) -> (Self, Option<String>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (
                Self::default(),
                Some(format!(
                    "Failed to load config at {}: {e}; using defaults",
                    path.display()
                )),
            ),
        }
    }

    /// Load config from an explicit file. Unlike [`AppConfig::load`], errors are returned.
    pub fn load_from(path: &Path) -> ShotcraftResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    fn validate(&self) -> ShotcraftResult<()> {
        if !matches!(self.export.image_format.as_str(), "png" | "jpeg" | "jpg") {
            return Err(ShotcraftError::config(format!(
                "unknown image format '{}'",
                self.export.image_format
            )));
        }
        if self.export.jpeg_quality == 0 || self.export.jpeg_quality > 100 {
            return Err(ShotcraftError::config("jpeg_quality must be within 1..=100"));
        }
        if self.export.video.channel_capacity == 0 {
            return Err(ShotcraftError::config("channel_capacity must be positive"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shotcraft").join("config.json")
}

/// Default export directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("shotcraft").join("exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shotcraft-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let path = temp_file("partial.json", r#"{ "export": { "jpeg_quality": 75 } }"#);
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.export.jpeg_quality, 75);
        assert_eq!(config.export.image_format, "png");
        assert_eq!(config.export.video, VideoEncodeSettings::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let path = temp_file("bad.json", r#"{ "export": { "jpeg_quality": 0 } }"#);
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ShotcraftError::Config { .. })
        ));
    }

    #[test]
    fn test_roundtrip_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.export.video.crf, 18);
        assert_eq!(back.export.video.channel_capacity, 8);
    }

    #[test]
    fn test_load_or_default_warns_only_on_broken_file() {
        let missing = std::env::temp_dir().join("shotcraft-config-missing").join("config.json");
        let (config, warning) = AppConfig::load_or_default(&missing);
        assert!(warning.is_none());
        assert_eq!(config.export.jpeg_quality, AppConfig::default().export.jpeg_quality);

        let good = temp_file("good.json", r#"{ "export": { "jpeg_quality": 60 } }"#);
        let (config, warning) = AppConfig::load_or_default(&good);
        assert!(warning.is_none());
        assert_eq!(config.export.jpeg_quality, 60);

        let broken = temp_file("broken.json", "{ not json");
        let (config, warning) = AppConfig::load_or_default(&broken);
        assert!(warning.unwrap().contains("broken.json"));
        assert_eq!(config.export.jpeg_quality, AppConfig::default().export.jpeg_quality);
    }
}
