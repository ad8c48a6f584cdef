//! Polygon helpers over integer vertices.
//!
//! Shapes are closed implicitly: the last vertex connects back to the first.
//! Vertex order matters for [`signed_area`] (counter-clockwise in a y-down
//! image frame gives a negative sign) but not for [`area`].

use nalgebra::{Point2, Vector2};
use std::f64::consts::{PI, TAU};

/// Ordered outline of one extracted region.
pub type Shape = Vec<Point2<i32>>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("degenerate polygon with {vertices} vertices has zero area")]
    Degenerate { vertices: usize },
}

/// Shoelace sum halved, keeping the winding sign.
pub fn signed_area(shape: &[Point2<i32>]) -> f64 {
    let n = shape.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0i128;
    for i in 0..n {
        let a = shape[i];
        let b = shape[(i + 1) % n];
        twice += i128::from(a.x) * i128::from(b.y) - i128::from(a.y) * i128::from(b.x);
    }
    twice as f64 / 2.0
}

/// Absolute polygon area; zero for fewer than three vertices.
#[inline]
pub fn area(shape: &[Point2<i32>]) -> f64 {
    signed_area(shape).abs()
}

/// Polygon centroid, rounded to the nearest pixel.
pub fn centroid(shape: &[Point2<i32>]) -> Result<Point2<i32>, GeometryError> {
    let a = signed_area(shape);
    if a == 0.0 {
        return Err(GeometryError::Degenerate {
            vertices: shape.len(),
        });
    }

    let n = shape.len();
    let mut cx = 0.0f64;
    let mut cy = 0.0f64;
    for i in 0..n {
        let p = shape[i];
        let q = shape[(i + 1) % n];
        let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        cx += (p.x as f64 + q.x as f64) * cross;
        cy += (p.y as f64 + q.y as f64) * cross;
    }
    let k = 1.0 / (6.0 * a);
    Ok(Point2::new((cx * k).round() as i32, (cy * k).round() as i32))
}

/// Rotate every vertex by `angle` radians about `pivot`, in place.
///
/// Coordinates are rounded back to integers, so repeated small rotations
/// accumulate rounding error. Results outside the `i32` range saturate.
pub fn rotate_about(shape: &mut [Point2<i32>], angle: f64, pivot: Point2<i32>) {
    let (sin, cos) = angle.sin_cos();
    let (px, py) = (pivot.x as f64, pivot.y as f64);
    for p in shape.iter_mut() {
        let x = p.x as f64 - px;
        let y = p.y as f64 - py;
        p.x = (px + x * cos - y * sin).round() as i32;
        p.y = (py + x * sin + y * cos).round() as i32;
    }
}

/// Rotate a shape about its own centroid and return that centroid.
pub fn rotate(shape: &mut [Point2<i32>], angle: f64) -> Result<Point2<i32>, GeometryError> {
    let c = centroid(shape)?;
    rotate_about(shape, angle, c);
    Ok(c)
}

/// Signed angle from `v1` to `v2`, normalized into `(-π, π]`.
pub fn angle_between(v1: Vector2<f64>, v2: Vector2<f64>) -> f64 {
    let mut d = v2.y.atan2(v2.x) - v1.y.atan2(v1.x);
    while d > PI {
        d -= TAU;
    }
    while d <= -PI {
        d += TAU;
    }
    d
}
