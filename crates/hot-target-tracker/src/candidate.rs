use hot_target_core::{area, ratio_to_score, BoundingBox, Shape};
use serde::{Deserialize, Serialize};

use crate::Thresholds;

/// Which role a candidate competes for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide: static target.
    Vertical,
    /// Wider than tall (or square): hot target.
    Horizontal,
}

/// One extracted shape scored as a possible target.
///
/// Everything is computed in [`Candidate::new`]; the value is immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct Candidate {
    shape: Shape,
    bbox: BoundingBox,
    polygon_area: f64,
    rectangularity_score: f64,
    aspect_ratio_score: f64,
    score: f64,
    valid: bool,
}

impl Candidate {
    /// Score `shape` against `thresholds`.
    ///
    /// Both sub-tests always run so the sub-scores are available for
    /// diagnostics even when an earlier test already failed.
    pub fn new(shape: Shape, thresholds: &Thresholds) -> Self {
        let bbox = BoundingBox::from_points(&shape).unwrap_or_default();
        let polygon_area = area(&shape);
        let mut valid = true;

        // Degenerate outlines are dropped here instead of surfacing as errors.
        if polygon_area <= 0.0 || bbox.width == 0 || bbox.height == 0 {
            valid = false;
        }

        let rectangularity_score = ratio_to_score(polygon_area / bbox.area());
        if polygon_area < thresholds.min_area
            || rectangularity_score < thresholds.min_rectangularity_score
        {
            valid = false;
        }

        let ideal = match orientation_of(&bbox) {
            Orientation::Vertical => thresholds.static_aspect_ratio,
            Orientation::Horizontal => thresholds.hot_aspect_ratio,
        };
        let aspect = bbox.width as f64 / bbox.height as f64;
        let aspect_ratio_score = ratio_to_score(aspect / ideal);
        if aspect_ratio_score < thresholds.min_aspect_ratio_score {
            valid = false;
        }

        let score = if valid {
            (rectangularity_score + aspect_ratio_score) / 2.0
        } else {
            0.0
        };

        Self {
            shape,
            bbox,
            polygon_area,
            rectangularity_score,
            aspect_ratio_score,
            score,
            valid,
        }
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn polygon_area(&self) -> f64 {
        self.polygon_area
    }

    #[inline]
    pub fn rectangularity_score(&self) -> f64 {
        self.rectangularity_score
    }

    #[inline]
    pub fn aspect_ratio_score(&self) -> f64 {
        self.aspect_ratio_score
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        orientation_of(&self.bbox)
    }

    #[inline]
    pub fn is_vertical(&self) -> bool {
        self.orientation() == Orientation::Vertical
    }
}

fn orientation_of(bbox: &BoundingBox) -> Orientation {
    if bbox.height > bbox.width {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Shape {
        vec![
            Point2::new(x, y),
            Point2::new(x + w, y),
            Point2::new(x + w, y + h),
            Point2::new(x, y + h),
        ]
    }

    #[test]
    fn ideal_static_rectangle_scores_full_marks() {
        let c = Candidate::new(rect(100, 50, 8, 64), &Thresholds::default());
        assert!(c.is_valid());
        assert!(c.is_vertical());
        assert_relative_eq!(c.aspect_ratio_score(), 100.0);
        assert_relative_eq!(c.rectangularity_score(), 100.0);
        assert_relative_eq!(c.score(), 100.0);
        assert_eq!(*c.bounding_box(), BoundingBox::new(100, 50, 8, 64));
    }

    #[test]
    fn ideal_hot_rectangle_scores_full_aspect() {
        let c = Candidate::new(rect(0, 0, 47, 8), &Thresholds::default());
        assert!(c.is_valid());
        assert_eq!(c.orientation(), Orientation::Horizontal);
        assert_relative_eq!(c.aspect_ratio_score(), 100.0);
    }

    #[test]
    fn small_area_is_invalid_even_with_perfect_aspect() {
        // 4x32 has the ideal static aspect ratio but only 128 px² of area.
        let t = Thresholds {
            min_area: 200.0,
            ..Thresholds::default()
        };
        let c = Candidate::new(rect(0, 0, 4, 32), &t);
        assert_relative_eq!(c.aspect_ratio_score(), 100.0);
        assert!(!c.is_valid());
        assert_eq!(c.score(), 0.0);
    }

    #[test]
    fn triangle_fails_rectangularity() {
        let t = Thresholds {
            min_rectangularity_score: 60.0,
            ..Thresholds::default()
        };
        let tri = vec![Point2::new(0, 0), Point2::new(20, 160), Point2::new(0, 160)];
        let c = Candidate::new(tri, &t);
        assert_relative_eq!(c.rectangularity_score(), 50.0);
        assert!(!c.is_valid());
    }

    #[test]
    fn huge_shape_scores_without_overflow() {
        let shape = vec![
            Point2::new(-2_000_000_000, 0),
            Point2::new(2_000_000_000, 0),
            Point2::new(2_000_000_000, 10),
            Point2::new(-2_000_000_000, 10),
        ];
        let c = Candidate::new(shape, &Thresholds::default());
        assert_eq!(c.bounding_box().width, 4_000_000_000);
        assert_eq!(c.orientation(), Orientation::Horizontal);
        assert_relative_eq!(c.rectangularity_score(), 100.0);
        assert_eq!(c.aspect_ratio_score(), 0.0);
        assert!(!c.is_valid());
    }

    #[test]
    fn wrong_aspect_is_invalid() {
        // Taller than wide, but far too chunky for 4:32 tape.
        let c = Candidate::new(rect(0, 0, 30, 40), &Thresholds::default());
        assert_eq!(c.orientation(), Orientation::Vertical);
        assert_eq!(c.aspect_ratio_score(), 0.0);
        assert!(!c.is_valid());

        // A square counts as horizontal and sits at 1/5.875 of the hot ratio.
        let c = Candidate::new(rect(0, 0, 40, 40), &Thresholds::default());
        assert_eq!(c.orientation(), Orientation::Horizontal);
        assert_relative_eq!(c.aspect_ratio_score(), 100.0 / 5.875, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_shapes_are_invalid_not_errors() {
        let t = Thresholds {
            min_area: 0.0,
            min_rectangularity_score: 0.0,
            min_aspect_ratio_score: 0.0,
            ..Thresholds::default()
        };
        for shape in [
            Vec::new(),
            vec![Point2::new(3, 3)],
            vec![Point2::new(0, 0), Point2::new(0, 50), Point2::new(0, 80)],
        ] {
            let c = Candidate::new(shape, &t);
            assert!(!c.is_valid());
            assert_eq!(c.score(), 0.0);
        }
    }
}
