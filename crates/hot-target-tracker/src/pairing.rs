//! Static/hot target pairing.
//!
//! A pairing is hot only if the hot candidate sits beside the static tape at
//! the expected distance and height, and its tape is as thick as the static
//! tape is wide.

use hot_target_core::ratio_to_score;
use serde::{Deserialize, Serialize};

use crate::{Candidate, Thresholds};

/// Scores of the pairing tests that actually ran.
///
/// Tests run in order horizontal → vertical → tape width and stop at the
/// first failure, so later fields stay `None`. A horizontal overlap fails
/// without a score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairScores {
    pub horizontal_distance: Option<f64>,
    pub vertical_distance: Option<f64>,
    pub tape_width: Option<f64>,
}

/// A static target and, if it passed every test, its hot target.
#[derive(Clone, Debug)]
pub struct Pairing<'a> {
    static_target: &'a Candidate,
    hot_target: Option<&'a Candidate>,
    scores: PairScores,
}

impl<'a> Pairing<'a> {
    /// Pair `static_target` with an optional hot candidate.
    ///
    /// Without a hot candidate no test runs and the pair is not hot. A hot
    /// candidate that fails a test is dropped, so callers only ever see a
    /// hot target that passed.
    pub fn new(
        static_target: &'a Candidate,
        hot_candidate: Option<&'a Candidate>,
        thresholds: &Thresholds,
    ) -> Self {
        let mut scores = PairScores::default();
        let hot_target = hot_candidate
            .filter(|hot| run_tests(static_target, hot, thresholds, &mut scores));
        Self {
            static_target,
            hot_target,
            scores,
        }
    }

    #[inline]
    pub fn is_hot(&self) -> bool {
        self.hot_target.is_some()
    }

    #[inline]
    pub fn static_target(&self) -> &'a Candidate {
        self.static_target
    }

    #[inline]
    pub fn hot_target(&self) -> Option<&'a Candidate> {
        self.hot_target
    }

    #[inline]
    pub fn scores(&self) -> &PairScores {
        &self.scores
    }
}

fn run_tests(
    static_target: &Candidate,
    hot: &Candidate,
    thresholds: &Thresholds,
    scores: &mut PairScores,
) -> bool {
    horizontal_distance(static_target, hot, thresholds, scores)
        && vertical_distance(static_target, hot, thresholds, scores)
        && tape_width(static_target, hot, thresholds, scores)
}

fn horizontal_distance(
    static_target: &Candidate,
    hot: &Candidate,
    thresholds: &Thresholds,
    scores: &mut PairScores,
) -> bool {
    let hot_box = hot.bounding_box();
    let static_box = static_target.bounding_box();

    let hot_center = hot_box.center_x();
    let gap = if hot_box.max_x() < static_box.min_x() {
        static_box.min_x() - hot_center
    } else if static_box.max_x() < hot_box.min_x() {
        hot_center - static_box.max_x()
    } else {
        return false;
    };

    let score = ratio_to_score(gap / hot_box.width as f64 / thresholds.horizontal_distance_ratio);
    scores.horizontal_distance = Some(score);
    score >= thresholds.min_horizontal_distance_score
}

fn vertical_distance(
    static_target: &Candidate,
    hot: &Candidate,
    thresholds: &Thresholds,
    scores: &mut PairScores,
) -> bool {
    let hot_box = hot.bounding_box();
    let static_box = static_target.bounding_box();
    let ratio = 1.0 - (static_box.max_y() - hot_box.center_y()) / (4.0 * hot_box.height as f64);
    let score = ratio_to_score(ratio);
    scores.vertical_distance = Some(score);
    score >= thresholds.min_vertical_distance_score
}

fn tape_width(
    static_target: &Candidate,
    hot: &Candidate,
    thresholds: &Thresholds,
    scores: &mut PairScores,
) -> bool {
    let ratio =
        hot.bounding_box().height as f64 / static_target.bounding_box().width as f64;
    let score = ratio_to_score(ratio);
    scores.tape_width = Some(score);
    score >= thresholds.min_tape_width_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hot_target_core::Shape;
    use nalgebra::Point2;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Shape {
        vec![
            Point2::new(x, y),
            Point2::new(x + w, y),
            Point2::new(x + w, y + h),
            Point2::new(x, y + h),
        ]
    }

    fn static_tape() -> Candidate {
        // 8 px wide, 64 px tall.
        Candidate::new(rect(200, 100, 8, 64), &Thresholds::default())
    }

    #[test]
    fn hot_tape_left_of_static_is_hot() {
        let t = Thresholds::default();
        let st = static_tape();
        // 47x8 hot tape, center at x = 143.5: gap 56.5 / 47 / 1.2 ~ 1.0.
        let hot = Candidate::new(rect(120, 100, 47, 8), &t);
        let pair = Pairing::new(&st, Some(&hot), &t);
        assert!(pair.is_hot());
        assert!(pair.hot_target().is_some());
        let s = pair.scores();
        assert!(s.horizontal_distance.expect("ran") > 95.0);
        assert_relative_eq!(s.tape_width.expect("ran"), 100.0);
    }

    #[test]
    fn hot_tape_right_of_static_is_hot() {
        let t = Thresholds::default();
        let st = static_tape();
        let hot = Candidate::new(rect(241, 100, 47, 8), &t);
        assert!(Pairing::new(&st, Some(&hot), &t).is_hot());
    }

    #[test]
    fn overlapping_boxes_are_never_hot() {
        let t = Thresholds {
            min_horizontal_distance_score: 0.0,
            min_vertical_distance_score: 0.0,
            min_tape_width_score: 0.0,
            ..Thresholds::default()
        };
        let st = static_tape();
        let hot = Candidate::new(rect(180, 100, 47, 8), &t);
        let pair = Pairing::new(&st, Some(&hot), &t);
        assert!(!pair.is_hot());
        assert!(pair.hot_target().is_none());
        assert_eq!(*pair.scores(), PairScores::default());
    }

    #[test]
    fn missing_hot_candidate_runs_no_tests() {
        let st = static_tape();
        let pair = Pairing::new(&st, None, &Thresholds::default());
        assert!(!pair.is_hot());
        assert_eq!(*pair.scores(), PairScores::default());
    }

    #[test]
    fn thick_hot_tape_fails_tape_width_and_is_cleared() {
        let t = Thresholds::default();
        let st = static_tape();
        // 24 px tall tape against an 8 px wide static tape: ratio 3 -> score 0.
        let hot = Candidate::new(rect(40, 100, 141, 24), &t);
        let pair = Pairing::new(&st, Some(&hot), &t);
        assert!(!pair.is_hot());
        assert!(pair.hot_target().is_none());
        assert_eq!(pair.scores().tape_width, Some(0.0));
    }

    #[test]
    fn far_away_hot_tape_stops_after_horizontal_test() {
        let t = Thresholds::default();
        let st = static_tape();
        let hot = Candidate::new(rect(600, 100, 47, 8), &t);
        let pair = Pairing::new(&st, Some(&hot), &t);
        assert!(!pair.is_hot());
        assert_eq!(pair.scores().horizontal_distance, Some(0.0));
        assert_eq!(pair.scores().vertical_distance, None);
    }

    #[test]
    fn vertical_threshold_is_configurable() {
        let st = static_tape();
        let strict = Thresholds {
            min_vertical_distance_score: 50.0,
            ..Thresholds::default()
        };

        // Hot tape level with the top of the static tape scores 0 here, which
        // only the default threshold of 0 lets through.
        let top = Candidate::new(rect(120, 100, 47, 8), &strict);
        assert!(Pairing::new(&st, Some(&top), &Thresholds::default()).is_hot());
        let pair = Pairing::new(&st, Some(&top), &strict);
        assert!(!pair.is_hot());
        assert_eq!(pair.scores().vertical_distance, Some(0.0));
        assert_eq!(pair.scores().tape_width, None);

        let bottom = Candidate::new(rect(120, 160, 47, 8), &strict);
        let pair = Pairing::new(&st, Some(&bottom), &strict);
        assert!(pair.is_hot());
        assert_relative_eq!(pair.scores().vertical_distance.expect("ran"), 100.0);
    }
}
