//! Core types and utilities for hot target tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image type, camera or contour extractor.

mod bbox;
mod logger;
mod polygon;
mod score;

pub use bbox::BoundingBox;
pub use polygon::{
    angle_between, area, centroid, rotate, rotate_about, signed_area, GeometryError, Shape,
};
pub use score::ratio_to_score;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
