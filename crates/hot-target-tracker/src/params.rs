use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Static target tape is 4 in wide and 32 in tall.
pub const STATIC_TARGET_ASPECT_RATIO: f64 = 4.0 / 32.0;
/// Hot target tape is 23.5 in wide and 4 in tall.
pub const HOT_TARGET_ASPECT_RATIO: f64 = 23.5 / 4.0;

/// Tunable thresholds for candidate scoring, pairing and frame voting.
///
/// Scores are on the `0..=100` scale produced by
/// [`ratio_to_score`](hot_target_core::ratio_to_score).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum polygon area in square pixels.
    pub min_area: f64,
    pub min_rectangularity_score: f64,
    pub min_aspect_ratio_score: f64,
    pub min_horizontal_distance_score: f64,
    pub min_tape_width_score: f64,
    /// Defaults to 0, which lets every pair through the vertical test.
    pub min_vertical_distance_score: f64,
    /// Ideal width/height of the vertical (static) target.
    pub static_aspect_ratio: f64,
    /// Ideal width/height of the horizontal (hot) target.
    pub hot_aspect_ratio: f64,
    /// Expected gap between the targets in hot-target widths.
    pub horizontal_distance_ratio: f64,
    /// Counted frames required before a decision is reported.
    pub min_frames: u32,
    /// Hot-frame ratio at or above which the goal is reported hot.
    pub min_hot_frame_ratio: f64,
    /// Hot-frame ratio at or below which the goal is reported not hot.
    pub max_hot_frame_ratio: f64,
    /// Time after the window opens during which frames are not counted.
    pub start_delay_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_area: 100.0,
            min_rectangularity_score: 10.0,
            min_aspect_ratio_score: 10.0,
            min_horizontal_distance_score: 20.0,
            min_tape_width_score: 20.0,
            min_vertical_distance_score: 0.0,
            static_aspect_ratio: STATIC_TARGET_ASPECT_RATIO,
            hot_aspect_ratio: HOT_TARGET_ASPECT_RATIO,
            horizontal_distance_ratio: 1.2,
            min_frames: 4,
            min_hot_frame_ratio: 0.6,
            max_hot_frame_ratio: 0.4,
            start_delay_ms: 100,
        }
    }
}

/// Reasons a [`Thresholds`] value is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ThresholdsError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} = {value} must be finite and positive")]
    NotPositive { field: &'static str, value: f64 },
    #[error("min_frames must be at least 1")]
    ZeroMinFrames,
    #[error("max_hot_frame_ratio ({max_hot}) is above min_hot_frame_ratio ({min_hot})")]
    InvertedVoteBand { min_hot: f64, max_hot: f64 },
}

impl Thresholds {
    #[inline]
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ThresholdsError> {
        let scores = [
            ("min_rectangularity_score", self.min_rectangularity_score),
            ("min_aspect_ratio_score", self.min_aspect_ratio_score),
            (
                "min_horizontal_distance_score",
                self.min_horizontal_distance_score,
            ),
            ("min_tape_width_score", self.min_tape_width_score),
            (
                "min_vertical_distance_score",
                self.min_vertical_distance_score,
            ),
        ];
        for (field, value) in scores {
            check_range(field, value, 0.0, 100.0)?;
        }
        check_range("min_area", self.min_area, 0.0, f64::MAX)?;
        check_range("min_hot_frame_ratio", self.min_hot_frame_ratio, 0.0, 1.0)?;
        check_range("max_hot_frame_ratio", self.max_hot_frame_ratio, 0.0, 1.0)?;

        for (field, value) in [
            ("static_aspect_ratio", self.static_aspect_ratio),
            ("hot_aspect_ratio", self.hot_aspect_ratio),
            ("horizontal_distance_ratio", self.horizontal_distance_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ThresholdsError::NotPositive { field, value });
            }
        }

        if self.min_frames == 0 {
            return Err(ThresholdsError::ZeroMinFrames);
        }
        if self.max_hot_frame_ratio > self.min_hot_frame_ratio {
            return Err(ThresholdsError::InvertedVoteBand {
                min_hot: self.min_hot_frame_ratio,
                max_hot: self.max_hot_frame_ratio,
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ThresholdsError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ThresholdsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Thresholds shared between the configuration side and the processing thread.
///
/// Readers take a copy once per frame; writers replace the whole value
/// through [`SharedThresholds::set`]. Last write wins.
#[derive(Clone, Debug, Default)]
pub struct SharedThresholds {
    inner: Arc<RwLock<Thresholds>>,
}

impl SharedThresholds {
    pub fn new(thresholds: Thresholds) -> Result<Self, ThresholdsError> {
        thresholds.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(thresholds)),
        })
    }

    /// Snapshot of the current values.
    pub fn get(&self) -> Thresholds {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace all values. Invalid input is rejected and the old values stay.
    pub fn set(&self, thresholds: Thresholds) -> Result<(), ThresholdsError> {
        thresholds.validate()?;
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = thresholds;
        Ok(())
    }

    /// Apply an in-place edit, validating the result before it is published.
    pub fn update<F>(&self, edit: F) -> Result<Thresholds, ThresholdsError>
    where
        F: FnOnce(&mut Thresholds),
    {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut next = *guard;
        edit(&mut next);
        next.validate()?;
        *guard = next;
        Ok(next)
    }
}
