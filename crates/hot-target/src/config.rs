//! JSON configuration for the tracker binary.
//!
//! Every section has defaults, so `{}` is a valid file once a camera address
//! or team number is given.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use hot_target_tracker::{Thresholds, ThresholdsError};
use serde::{Deserialize, Serialize};

use crate::camera::{team_camera_address, CameraSettings};
use crate::extract::{ExtractError, HsvParams};
use crate::pipeline::PipelineSettings;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Thresholds(#[from] ThresholdsError),
    #[error(transparent)]
    Extractor(#[from] ExtractError),
    #[error("camera needs either an address or a team number")]
    MissingCameraAddress,
    #[error("camera.{field} must be positive")]
    ZeroTimeout { field: &'static str },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Host or `host:port`; wins over `team`.
    pub address: Option<String>,
    pub team: Option<u16>,
    pub path: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub stall_timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub frame_interval_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: None,
            team: None,
            path: "/mjpg/video.mjpg".to_string(),
            connect_timeout_ms: 2000,
            read_timeout_ms: 250,
            stall_timeout_ms: 3000,
            reconnect_backoff_ms: 100,
            frame_interval_ms: 1,
        }
    }
}

impl CameraConfig {
    /// Stream URL, e.g. `http://10.20.84.11/mjpg/video.mjpg`.
    pub fn url(&self) -> Result<String, ConfigError> {
        let host = match (&self.address, self.team) {
            (Some(address), _) => address.clone(),
            (None, Some(team)) => team_camera_address(team),
            (None, None) => return Err(ConfigError::MissingCameraAddress),
        };
        let path = self.path.trim_start_matches('/');
        Ok(format!("http://{host}/{path}"))
    }

    pub fn settings(&self) -> Result<CameraSettings, ConfigError> {
        Ok(CameraSettings {
            url: self.url()?,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            stall_timeout: Duration::from_millis(self.stall_timeout_ms),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("stall_timeout_ms", self.stall_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout { field });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub camera: CameraConfig,
    pub extractor: HsvParams,
    pub thresholds: Thresholds,
    pub pipeline: PipelineConfig,
}

impl TrackerConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything except the camera address, which only live
    /// tracking needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.extractor.validate()?;
        self.camera.validate()?;
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            frame_interval: Duration::from_millis(self.camera.frame_interval_ms),
            reconnect_backoff: Duration::from_millis(self.camera.reconnect_backoff_ms),
            poll_interval: Duration::from_millis(self.pipeline.poll_interval_ms),
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Reloads a config file when its modification time changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Watch `path`, treating its current contents as already loaded.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modified = modified(&path);
        Self { path, modified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` while the file is unchanged, otherwise the result of loading
    /// the new contents. A failed load is reported once per change.
    pub fn poll(&mut self) -> Option<Result<TrackerConfig, ConfigError>> {
        let current = modified(&self.path);
        if current == self.modified {
            return None;
        }
        self.modified = current;
        Some(TrackerConfig::load(&self.path))
    }
}
