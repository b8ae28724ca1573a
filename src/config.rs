//! Configuration management for CrabFocus
//!
//! Loads, saves and validates the settings a focus session runs with: which
//! camera to open, how many frames to request and how long to wait for each,
//! where the region of interest sits, how the Laplacian response is computed
//! and how results are reported.

use crate::acquisition::{SessionConfig, SourceSettings};
use crate::errors::FocusError;
use crate::focus::{ResponseMode, RoiPlacement, RoiSpec};
use crate::types::PixelFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `CRABFOCUS_SESSION__FRAME_BUDGET=50`.
pub const ENV_PREFIX: &str = "CRABFOCUS";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CrabFocusConfig {
    pub camera: CameraConfig,
    pub session: SessionSection,
    pub roi: RoiSpec,
    pub scoring: ScoringConfig,
    pub report: ReportConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index as enumerated by the platform backend
    pub device_index: u32,
    /// Pixel format name, e.g. "Mono8" or "RGB8"
    pub pixel_format: String,
    /// Exposure time in microseconds
    pub exposure_time_us: f64,
}

/// Acquisition loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Number of frames to request before stopping
    pub frame_budget: u64,
    /// Per-frame retrieve timeout in milliseconds
    pub retrieve_timeout_ms: u64,
    /// Grab on a separate thread while scoring
    pub pipelined: bool,
    /// Depth of the capture queue when pipelined
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScoringConfig {
    pub response: ResponseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    /// Wait for Enter before the CLI exits
    pub wait_for_enter: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let source = SourceSettings::default();
        Self {
            device_index: 0,
            pixel_format: source.pixel_format.to_string(),
            exposure_time_us: source.exposure_time_us,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            frame_budget: session.frame_budget,
            retrieve_timeout_ms: 5000,
            pipelined: false,
            queue_capacity: crate::acquisition::pipeline::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Text,
            wait_for_enter: true,
        }
    }
}

impl CrabFocusConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, FocusError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| FocusError::Config(format!("Failed to read config file: {}", e)))?;

        let config: CrabFocusConfig = toml::from_str(&contents)
            .map_err(|e| FocusError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FocusError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                FocusError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| FocusError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| FocusError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabfocus.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Defaults, overlaid by an optional TOML file, overlaid by `CRABFOCUS_*`
    /// environment variables (`__` separates section from key).
    pub fn load_layered<P: AsRef<Path>>(path: Option<P>) -> Result<Self, FocusError> {
        let defaults = ::config::Config::try_from(&Self::default())
            .map_err(|e| FocusError::Config(format!("Failed to seed defaults: {}", e)))?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path.as_ref())
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: CrabFocusConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| FocusError::Config(format!("Failed to load layered config: {}", e)))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), FocusError> {
        self.pixel_format()?;
        if !self.camera.exposure_time_us.is_finite() || self.camera.exposure_time_us <= 0.0 {
            return Err(FocusError::Config(
                "Exposure time must be a positive number of microseconds".to_string(),
            ));
        }

        if self.session.frame_budget == 0 {
            return Err(FocusError::Config("Frame budget must be at least 1".to_string()));
        }
        if self.session.retrieve_timeout_ms == 0 {
            return Err(FocusError::Config(
                "Retrieve timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.session.queue_capacity == 0 {
            return Err(FocusError::Config(
                "Queue capacity must be at least 1".to_string(),
            ));
        }

        if self.roi.width == 0 || self.roi.height == 0 {
            return Err(FocusError::Config(format!(
                "ROI must have positive dimensions, got {}x{}",
                self.roi.width, self.roi.height
            )));
        }
        if let RoiPlacement::Fixed { offset_x, offset_y } = self.roi.placement {
            if offset_x.checked_add(self.roi.width).is_none()
                || offset_y.checked_add(self.roi.height).is_none()
            {
                return Err(FocusError::Config("Fixed ROI offset overflows".to_string()));
            }
        }

        Ok(())
    }

    pub fn pixel_format(&self) -> Result<PixelFormat, FocusError> {
        self.camera.pixel_format.parse()
    }

    pub fn source_settings(&self) -> Result<SourceSettings, FocusError> {
        Ok(SourceSettings {
            pixel_format: self.pixel_format()?,
            exposure_time_us: self.camera.exposure_time_us,
        })
    }

    /// Session parameters for the acquisition loop.
    pub fn session_config(&self) -> Result<SessionConfig, FocusError> {
        self.validate()?;
        Ok(SessionConfig {
            frame_budget: self.session.frame_budget,
            retrieve_timeout: Duration::from_millis(self.session.retrieve_timeout_ms),
            roi: self.roi,
            response: self.scoring.response,
            source: self.source_settings()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrabFocusConfig::default();
        assert_eq!(config.camera.pixel_format, "Mono8");
        assert_eq!(config.camera.exposure_time_us, 10000.0);
        assert_eq!(config.session.frame_budget, 10_000);
        assert_eq!(config.session.retrieve_timeout_ms, 5000);
        assert_eq!((config.roi.width, config.roi.height), (300, 300));
        assert_eq!(config.report.format, ReportFormat::Text);
        assert!(config.report.wait_for_enter);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = CrabFocusConfig::default();
        bad.session.frame_budget = 0;
        assert_eq!(bad.validate().unwrap_err().code(), "CONFIG");

        let mut bad_roi = CrabFocusConfig::default();
        bad_roi.roi.width = 0;
        assert!(bad_roi.validate().is_err());

        let mut bad_format = CrabFocusConfig::default();
        bad_format.camera.pixel_format = "Mono7".to_string();
        assert_eq!(
            bad_format.validate().unwrap_err().code(),
            "UNSUPPORTED_ENCODING"
        );

        let mut bad_exposure = CrabFocusConfig::default();
        bad_exposure.camera.exposure_time_us = -1.0;
        assert!(bad_exposure.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = CrabFocusConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("[roi]"));
        assert!(toml_string.contains("[scoring]"));
        assert!(toml_string.contains("[report]"));
        assert!(toml_string.contains("frame_budget"));
        assert!(toml_string.contains("anchor_center"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CrabFocusConfig = toml::from_str(
            r#"
            [session]
            frame_budget = 25

            [roi]
            width = 64
            height = 48
            placement = { mode = "centered" }
            "#,
        )
        .unwrap();
        assert_eq!(config.session.frame_budget, 25);
        assert_eq!(config.session.retrieve_timeout_ms, 5000);
        assert_eq!(config.roi.placement, RoiPlacement::Centered);
        assert_eq!(config.camera.pixel_format, "Mono8");
    }

    #[test]
    fn test_session_config_conversion() {
        let mut config = CrabFocusConfig::default();
        config.session.frame_budget = 3;
        config.session.retrieve_timeout_ms = 250;
        config.scoring.response = ResponseMode::Signed;

        let session = config.session_config().unwrap();
        assert_eq!(session.frame_budget, 3);
        assert_eq!(session.retrieve_timeout, Duration::from_millis(250));
        assert_eq!(session.response, ResponseMode::Signed);
        assert_eq!(session.source.pixel_format, PixelFormat::Mono8);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CrabFocusConfig::load_from_file("nonexistent_crabfocus.toml");
        assert_eq!(result.unwrap(), CrabFocusConfig::default());
    }
}
