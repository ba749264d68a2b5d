//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoverreelError, CoverreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Private file area holding the stored cover image.
    pub store_dir: PathBuf,

    /// Where produced videos are written. Current directory when unset.
    pub output_dir: Option<PathBuf>,

    /// Transcoding engine settings.
    pub engine: EngineConfig,

    /// Encode argument template parameters.
    pub encode: EncodeSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How to reach the transcoding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ffmpeg binary (name on PATH or absolute path).
    pub ffmpeg_path: PathBuf,

    /// Scratch directory used as the engine's private file namespace.
    /// A per-process directory under the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

/// Parameters of the fixed encode argument template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// Video codec, tuned for a single still frame.
    pub video_codec: String,

    /// Encoder tune preset.
    pub tune: String,

    /// Audio codec.
    pub audio_codec: String,

    /// Audio bitrate (ffmpeg notation, e.g. "192k").
    pub audio_bitrate: String,

    /// Output pixel format.
    pub pixel_format: String,

    /// Pad odd image dimensions up to even ones.
    pub pad_to_even: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "coverreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            output_dir: None,
            engine: EngineConfig::default(),
            encode: EncodeSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            scratch_dir: None,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            tune: "stillimage".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            pixel_format: "yuv420p".to_string(),
            pad_to_even: true,
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
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load a config file the user named explicitly.
    ///
    /// Unlike [`AppConfig::load_from`], a missing or malformed file is an
    /// error rather than a silent fallback to defaults.
    pub fn load_required(config_path: &Path) -> CoverreelResult<Self> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            CoverreelError::config(format!("cannot read {}: {e}", config_path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CoverreelError::config(format!("invalid config {}: {e}", config_path.display()))
        })
    }

    /// Output directory, defaulting to the current directory.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
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
    base.join("coverreel").join("config.json")
}

/// Default private file area.
fn default_store_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("coverreel").join("store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"encode": {"audio_bitrate": "320k"}}"#).unwrap();
        assert_eq!(config.encode.audio_bitrate, "320k");
        assert_eq!(config.encode.video_codec, "libx264");
        assert!(config.encode.pad_to_even);
        assert_eq!(config.engine.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_explicit_config_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = AppConfig::load_required(&missing).unwrap_err();
        assert_eq!(err.kind(), "config");

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let err = AppConfig::load_required(&broken).unwrap_err();
        assert!(matches!(err, CoverreelError::Config { .. }));

        let good = dir.path().join("config.json");
        std::fs::write(&good, r#"{"output_dir": "/srv/videos"}"#).unwrap();
        let config = AppConfig::load_required(&good).unwrap();
        assert_eq!(config.resolved_output_dir(), PathBuf::from("/srv/videos"));
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/coverreel/config.json"));
        assert_eq!(config.encode, EncodeSettings::default());
        assert_eq!(config.resolved_output_dir(), PathBuf::from("."));
    }
}
