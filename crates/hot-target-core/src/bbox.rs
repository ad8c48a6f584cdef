use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in integer pixel coordinates.
///
/// `width` and `height` are the extents between the outermost vertices
/// (`max - min`), so a single point has a zero-sized box. They are unsigned
/// so that any two `i32` coordinates have a representable span.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing every point; `None` for an empty slice.
    pub fn from_points(points: &[Point2<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y) = (first.x, first.y);
        let (mut max_x, mut max_y) = (first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(
            min_x,
            min_y,
            max_x.abs_diff(min_x),
            max_y.abs_diff(min_y),
        ))
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.x as f64
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.y as f64
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x as f64 + self.width as f64
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y as f64 + self.height as f64
    }

    #[inline]
    pub fn center_x(&self) -> f64 {
        self.x as f64 + self.width as f64 / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    /// True if the horizontal extents of both boxes touch or overlap.
    pub fn overlaps_horizontally(&self, other: &BoundingBox) -> bool {
        !(self.max_x() < other.min_x() || other.max_x() < self.min_x())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_spans_outermost_vertices() {
        let pts = [
            Point2::new(3, 9),
            Point2::new(7, 2),
            Point2::new(12, 5),
            Point2::new(4, 11),
        ];
        let b = BoundingBox::from_points(&pts).expect("non-empty");
        assert_eq!(b, BoundingBox::new(3, 2, 9, 9));
        assert_eq!(b.max_x(), 12.0);
        assert_eq!(b.center_y(), 6.5);
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn horizontal_overlap_is_symmetric() {
        let a = BoundingBox::new(0, 0, 10, 50);
        let b = BoundingBox::new(5, 100, 20, 4);
        let c = BoundingBox::new(11, 0, 4, 4);
        assert!(a.overlaps_horizontally(&b));
        assert!(b.overlaps_horizontally(&a));
        assert!(!a.overlaps_horizontally(&c));
        assert!(!c.overlaps_horizontally(&a));
    }

    #[test]
    fn full_coordinate_range_fits() {
        let pts = [
            Point2::new(i32::MIN, -3),
            Point2::new(i32::MAX, 7),
        ];
        let b = BoundingBox::from_points(&pts).expect("non-empty");
        assert_eq!(b.width, u32::MAX);
        assert_eq!(b.height, 10);
        assert_eq!(b.max_x(), i32::MAX as f64);
        assert_eq!(b.center_x(), -0.5);
    }
}
