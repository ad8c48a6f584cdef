use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{Decision, Thresholds};

/// Where the decision window currently stands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    /// The robot has not opened a window.
    Inactive,
    /// Window open, still inside the start delay; frames are not counted.
    Arming,
    /// Frames are being counted.
    Voting,
}

/// Frame counters for the current decision window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VoteState {
    total_frames: u32,
    hot_frames: u32,
    window_start: Option<Instant>,
}

/// Counter values exposed in frame reports.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub total_frames: u32,
    pub hot_frames: u32,
}

impl VoteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to zero with no window start.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Note that the window is open at `now` and report its phase.
    ///
    /// The first call after a reset records the window start; later calls
    /// keep it, so the start delay runs from the first open frame.
    pub fn arm(&mut self, now: Instant, thresholds: &Thresholds) -> WindowPhase {
        let start = *self.window_start.get_or_insert(now);
        if now.saturating_duration_since(start) < thresholds.start_delay() {
            WindowPhase::Arming
        } else {
            WindowPhase::Voting
        }
    }

    /// Count one frame that produced a static target.
    pub fn record(&mut self, hot: bool) {
        self.total_frames = self.total_frames.saturating_add(1);
        if hot {
            self.hot_frames = self.hot_frames.saturating_add(1);
        }
    }

    /// Decision implied by the counters, or `None` below `min_frames`.
    pub fn decide(&self, thresholds: &Thresholds) -> Option<Decision> {
        if self.total_frames == 0 || self.total_frames < thresholds.min_frames {
            return None;
        }
        let ratio = self.hot_ratio();
        Some(if ratio >= thresholds.min_hot_frame_ratio {
            Decision::Hot
        } else if ratio <= thresholds.max_hot_frame_ratio {
            Decision::NotHot
        } else {
            Decision::Unknown
        })
    }

    /// Fraction of counted frames that were hot; 0 before any frame.
    pub fn hot_ratio(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.hot_frames as f64 / self.total_frames as f64
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            total_frames: self.total_frames,
            hot_frames: self.hot_frames,
        }
    }

    pub fn window_start(&self) -> Option<Instant> {
        self.window_start
    }
}
