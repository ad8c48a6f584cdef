//! Hot goal detection from extracted target outlines.
//!
//! ## Quickstart
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use hot_target_tracker::{FrameClassifier, MemoryStore, SharedThresholds, TargetTable};
//! use nalgebra::Point2;
//!
//! let table = TargetTable::new(Arc::new(MemoryStore::new()));
//! table.init();
//! let mut classifier = FrameClassifier::new(SharedThresholds::default(), table);
//!
//! let static_tape = vec![
//!     Point2::new(200, 100),
//!     Point2::new(208, 100),
//!     Point2::new(208, 164),
//!     Point2::new(200, 164),
//! ];
//! let report = classifier.process_shapes(vec![static_tape], Instant::now());
//! assert_eq!(report.is_hot, Some(false));
//! ```
//!
//! Pipeline per frame:
//! 1. Score every outline as a [`Candidate`] (rectangularity, aspect ratio).
//! 2. Pick the best vertical candidate as the static target and the best
//!    horizontal one as the hot target.
//! 3. Run the [`Pairing`] tests; the frame is hot if they all pass.
//! 4. While the robot holds the decision window open, count frames in a
//!    [`VoteState`] and report [`Decision`]s through the [`TargetTable`].

mod candidate;
mod classifier;
mod pairing;
mod params;
mod table;
mod vote;

pub use candidate::{Candidate, Orientation};
pub use classifier::{classify_shapes, select_targets, FrameClassifier, FrameReport, ShapeExtractor};
pub use pairing::{PairScores, Pairing};
pub use params::{
    SharedThresholds, Thresholds, ThresholdsError, HOT_TARGET_ASPECT_RATIO,
    STATIC_TARGET_ASPECT_RATIO,
};
pub use table::{
    Decision, KeyValueStore, MemoryStore, TargetTable, ENABLE_CAMERA_KEY, STATE_KEY,
    TARGET_TABLE_NAME, WINDOW_ACTIVE_KEY,
};
pub use vote::{VoteCounts, VoteState, WindowPhase};

pub use hot_target_core::{BoundingBox, Shape};
