//! Runtime configuration
//!
//! Every field has a default, so a partial (or empty) JSON document is a
//! valid configuration.

use crate::compositor::{LayoutConfiguration, Resolution};
use crate::export::DEFAULT_EXPORT_NAME;
use crate::recorder::{ContainerFormat, DEFAULT_CANDIDATES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub compositor: CompositorConfig,
    pub recorder: RecorderConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositorConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Layout used when `compose` is not given one
    pub default_layout: LayoutConfiguration,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30,
            default_layout: LayoutConfiguration::default(),
        }
    }
}

impl CompositorConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Container formats in order of preference
    pub candidate_formats: Vec<ContainerFormat>,
    pub ffmpeg_path: PathBuf,
    pub read_buffer_size: usize,
    /// 0 waits forever
    pub flush_timeout_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            candidate_formats: DEFAULT_CANDIDATES.to_vec(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            read_buffer_size: 64 * 1024,
            flush_timeout_ms: 10_000,
        }
    }
}

impl RecorderConfig {
    pub fn flush_timeout(&self) -> Option<Duration> {
        (self.flush_timeout_ms > 0).then(|| Duration::from_millis(self.flush_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub default_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            default_name: DEFAULT_EXPORT_NAME.to_string(),
        }
    }
}

impl Config {
    /// Read a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{ContainerShape, LayoutType};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.compositor.resolution(), Resolution::FULL_HD);
        assert_eq!(config.compositor.frame_rate, 30);
        assert_eq!(config.compositor.default_layout.kind, LayoutType::Split);
        assert_eq!(config.compositor.default_layout.container, ContainerShape::Original);
        assert_eq!(
            config.recorder.candidate_formats,
            vec![ContainerFormat::Webm, ContainerFormat::Ogg, ContainerFormat::Mp4]
        );
        assert_eq!(config.recorder.flush_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.export.default_name, "recording");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "compositor": {
                "width": 1280,
                "height": 720,
                "defaultLayout": { "type": "picture-in-picture", "container": "round" }
            },
            "recorder": { "candidateFormats": ["mp4"], "flushTimeoutMs": 0 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.compositor.resolution(), Resolution::new(1280, 720));
        assert_eq!(config.compositor.frame_rate, 30);
        assert_eq!(
            config.compositor.default_layout,
            LayoutConfiguration::picture_in_picture(ContainerShape::Round)
        );
        assert_eq!(config.recorder.candidate_formats, vec![ContainerFormat::Mp4]);
        assert_eq!(config.recorder.flush_timeout(), None);
        assert_eq!(config.recorder.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf/celluloid.json");

        let mut config = Config::default();
        config.export.default_name = "demo".to_string();
        config.recorder.read_buffer_size = 4096;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse(_))));
    }
}
