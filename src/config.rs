//! Configuration for config-driven pipeline runs.

use crate::core::{BodySegment, ChannelSelector};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the subject's files live
    pub project: ProjectConfig,

    /// Stages to run, in order
    pub stages: Vec<Stage>,

    /// Segmentation stage parameters
    pub segmentation: SegmentationConfig,

    /// Windowing and stacking stage parameters
    pub windowing: WindowingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            stages: vec![Stage::Segment, Stage::Stack],
            segmentation: SegmentationConfig::default(),
            windowing: WindowingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wpm-segmentation")
            .join("config.json")
    }

    /// Check sizes and the timezone name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.subject_name.trim().is_empty() {
            return Err(ConfigError::Invalid("subject name is empty".to_string()));
        }
        if self.windowing.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".to_string()));
        }
        if self.windowing.step_size == Some(0) {
            return Err(ConfigError::Invalid("step_size must be positive".to_string()));
        }
        self.segmentation.timezone()?;
        Ok(())
    }

    /// Recording CSV of the subject.
    pub fn recording_path(&self) -> PathBuf {
        self.project.file(&format!("{}.csv", self.project.subject_name))
    }

    pub fn segmented_path(&self) -> PathBuf {
        self.project.file(&format!("{}_segmented.npz", self.project.subject_name))
    }

    pub fn stacked_path(&self) -> PathBuf {
        self.project.file(&format!("{}_stacked.npz", self.project.subject_name))
    }

    pub fn report_path(&self) -> PathBuf {
        self.project.file(&format!("{}_report.json", self.project.subject_name))
    }

    /// Activity log, relative paths taken from the base folder.
    pub fn activity_log_path(&self) -> PathBuf {
        self.project.base_folder.join(&self.segmentation.activity_log)
    }
}

/// Subject and folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub base_folder: PathBuf,
    pub subject_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            base_folder: PathBuf::from("."),
            subject_name: "PMP1020_W1_PI".to_string(),
            description: None,
        }
    }
}

impl ProjectConfig {
    fn file(&self, name: &str) -> PathBuf {
        self.base_folder.join(name)
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// CSV recording to per-activity archive
    Segment,
    /// Per-activity archive to labeled window stack
    Stack,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Segment => write!(f, "segment"),
            Stage::Stack => write!(f, "stack"),
        }
    }
}

/// Parameters of the segmentation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// JSON activity schedule
    pub activity_log: PathBuf,
    pub body_segment: BodySegment,
    /// IANA name of the zone the schedule times are written in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            activity_log: PathBuf::from("activity_log.json"),
            body_segment: BodySegment::Thigh,
            timezone: default_timezone(),
        }
    }
}

impl SegmentationConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }
}

/// Parameters of the windowing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowingConfig {
    /// Samples per window
    pub window_size: usize,
    /// Samples between window starts; defaults to `window_size`
    #[serde(default)]
    pub step_size: Option<usize>,
    #[serde(default)]
    pub crop_columns: ChannelSelector,
}

impl Default for WindowingConfig {
    fn default() -> Self {
        Self {
            window_size: 250,
            step_size: Some(125),
            crop_columns: ChannelSelector::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
