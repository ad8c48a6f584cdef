//! Live hot goal tracking on top of `hot-target-tracker`.
//!
//! This crate provides:
//! - stable re-exports of the geometry and classification crates
//! - an HSV threshold [`ShapeExtractor`](tracker::ShapeExtractor) for RGB frames
//! - an MJPEG-over-HTTP camera behind the [`FrameSource`] trait
//! - the [`FramePipeline`]: a capture thread and a processing thread around a
//!   latest-frame slot
//! - JSON configuration and the `hot-target` binary (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hot_target::tracker::{FrameClassifier, MemoryStore, SharedThresholds, TargetTable};
//! use hot_target::{FramePipeline, HsvExtractor, MjpegCamera, StopMode, TrackerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackerConfig::load("tracker.json")?;
//! let table = TargetTable::new(Arc::new(MemoryStore::new()));
//! table.init();
//! let classifier = FrameClassifier::new(SharedThresholds::new(config.thresholds)?, table);
//!
//! let mut pipeline = FramePipeline::spawn(
//!     MjpegCamera::new(config.camera.settings()?),
//!     HsvExtractor::new(config.extractor.clone())?,
//!     classifier,
//!     config.pipeline_settings(),
//! )?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! println!("{:?} at {:.1} fps", pipeline.latest_report(), pipeline.fps());
//! pipeline.shutdown(StopMode::Graceful);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `hot_target::core`: polygon geometry, bounding boxes, scoring, logging.
//! - `hot_target::tracker`: candidates, pairing, voting, the robot table.
//! - [`camera`], [`extract`], [`pipeline`], [`config`]: the live system.

pub use hot_target_core as core;
pub use hot_target_tracker as tracker;

pub mod camera;
pub mod config;
pub mod extract;
pub mod pipeline;

pub use camera::{team_camera_address, CameraError, CameraSettings, FrameSource, MjpegCamera};
pub use config::{CameraConfig, ConfigError, PipelineConfig, TrackerConfig};
pub use extract::{ChannelRange, ExtractError, HsvExtractor, HsvParams};
pub use pipeline::{
    CaptureThread, FpsCounter, FramePipeline, FrameSlot, PipelineError, PipelineSettings,
    StopMode,
};
pub use hot_target_tracker::{Decision, FrameReport, Thresholds};
