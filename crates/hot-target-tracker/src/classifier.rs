//! Per-frame target selection and decision-window bookkeeping.

use hot_target_core::{BoundingBox, Shape};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Candidate, Decision, KeyValueStore, PairScores, Pairing, SharedThresholds, TargetTable,
    Thresholds, VoteCounts, VoteState, WindowPhase,
};

/// Turns a raw frame into candidate outlines.
///
/// Implementations own thresholding and contour extraction; each returned
/// shape is one region's outline, already reduced to its convex hull.
pub trait ShapeExtractor {
    type Frame;
    type Error: std::error::Error + Send + Sync + 'static;

    fn extract(&self, frame: &Self::Frame) -> Result<Vec<Shape>, Self::Error>;
}

/// Outcome of one processed frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Shapes handed in by the extractor.
    pub candidates: usize,
    /// Shapes that passed the candidate tests.
    pub valid_candidates: usize,
    pub static_target: Option<BoundingBox>,
    /// Set only when the pairing tests passed.
    pub hot_target: Option<BoundingBox>,
    /// `None` when no static target was found.
    pub is_hot: Option<bool>,
    pub pair_scores: Option<PairScores>,
    pub phase: Option<WindowPhase>,
    /// Whether this frame was counted toward the vote.
    pub counted: bool,
    pub votes: VoteCounts,
    /// Decision written to the table on this frame, if any.
    pub decision: Option<Decision>,
}

/// Best static and hot candidates among `candidates`.
///
/// Returns indices of the highest-scoring valid vertical and horizontal
/// candidates. Only strictly greater scores replace the current best, so
/// ties keep the first one seen and a zero score never wins.
pub fn select_targets(candidates: &[Candidate]) -> (Option<usize>, Option<usize>) {
    let mut best_static: Option<(usize, f64)> = None;
    let mut best_hot: Option<(usize, f64)> = None;
    for (idx, c) in candidates.iter().enumerate() {
        if !c.is_valid() {
            continue;
        }
        let slot = if c.is_vertical() {
            &mut best_static
        } else {
            &mut best_hot
        };
        let current = slot.map_or(0.0, |(_, s)| s);
        if c.score() > current {
            *slot = Some((idx, c.score()));
        }
    }
    (best_static.map(|b| b.0), best_hot.map(|b| b.0))
}

/// Frame classifier with the temporal vote for one table.
pub struct FrameClassifier<S: KeyValueStore + ?Sized> {
    thresholds: SharedThresholds,
    table: TargetTable<S>,
    votes: VoteState,
}

impl<S: KeyValueStore + ?Sized> FrameClassifier<S> {
    pub fn new(thresholds: SharedThresholds, table: TargetTable<S>) -> Self {
        Self {
            thresholds,
            table,
            votes: VoteState::new(),
        }
    }

    #[inline]
    pub fn table(&self) -> &TargetTable<S> {
        &self.table
    }

    #[inline]
    pub fn thresholds(&self) -> &SharedThresholds {
        &self.thresholds
    }

    #[inline]
    pub fn votes(&self) -> &VoteState {
        &self.votes
    }

    /// Extract shapes from `frame` and classify them.
    ///
    /// Extraction failures are returned before any vote state changes.
    pub fn process_frame<E: ShapeExtractor>(
        &mut self,
        extractor: &E,
        frame: &E::Frame,
        now: Instant,
    ) -> Result<FrameReport, E::Error> {
        let shapes = extractor.extract(frame)?;
        Ok(self.process_shapes(shapes, now))
    }

    /// Classify one frame's shapes and update the decision window.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, shapes, now), fields(num_shapes = shapes.len()))
    )]
    pub fn process_shapes(&mut self, shapes: Vec<Shape>, now: Instant) -> FrameReport {
        let thresholds = self.thresholds.get();
        let window_open = self.table.is_window_active();
        let mut report = classify_shapes(shapes, &thresholds);

        if !window_open {
            if self.votes != VoteState::default() {
                debug!("decision window closed without a decision, dropping votes");
            }
            self.votes.reset();
            report.phase = Some(WindowPhase::Inactive);
            return report;
        }

        let phase = self.votes.arm(now, &thresholds);
        report.phase = Some(phase);
        if phase == WindowPhase::Voting {
            // Frames without a static target are skipped, not counted as cold.
            if let Some(hot) = report.is_hot {
                self.votes.record(hot);
                report.counted = true;
            }
            report.votes = self.votes.counts();
            if let Some(decision) = self.votes.decide(&thresholds) {
                self.report_decision(decision);
                report.decision = Some(decision);
            }
        }
        report
    }

    fn report_decision(&mut self, decision: Decision) {
        self.table.set_state(decision);
        match decision {
            Decision::Hot | Decision::NotHot => {
                let counts = self.votes.counts();
                info!(
                    "told robot: {decision} ({}/{} hot frames)",
                    counts.hot_frames, counts.total_frames
                );
                self.table.set_window_active(false);
                self.table.set_camera_enabled(false);
                self.votes.reset();
            }
            Decision::Unknown => {
                debug!("vote ratio {:.2} inside the undecided band", self.votes.hot_ratio());
            }
        }
    }
}

/// Score, select and pair one frame's shapes without touching any vote.
pub fn classify_shapes(shapes: Vec<Shape>, thresholds: &Thresholds) -> FrameReport {
    let candidates: Vec<Candidate> = shapes
        .into_iter()
        .map(|s| Candidate::new(s, thresholds))
        .collect();

    let mut report = FrameReport {
        candidates: candidates.len(),
        valid_candidates: candidates.iter().filter(|c| c.is_valid()).count(),
        ..FrameReport::default()
    };

    let (static_idx, hot_idx) = select_targets(&candidates);
    let Some(static_idx) = static_idx else {
        return report;
    };
    let pair = Pairing::new(
        &candidates[static_idx],
        hot_idx.map(|h| &candidates[h]),
        thresholds,
    );
    debug!(
        "static target at {:?}: {}",
        pair.static_target().bounding_box(),
        if pair.is_hot() { "HOT" } else { "NOT HOT" }
    );
    report.static_target = Some(*pair.static_target().bounding_box());
    report.hot_target = pair.hot_target().map(|c| *c.bounding_box());
    report.is_hot = Some(pair.is_hot());
    report.pair_scores = Some(*pair.scores());
    report
}
